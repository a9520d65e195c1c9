//! Gradient clipping by global norm.
//!
//! burn's optimizer-level clipping works on one parameter tensor at a time. Here the
//! L2 norm is taken over every gradient of the module at once, and all gradients are
//! rescaled by the same factor when that norm exceeds the limit.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};

/// Added to the norm before dividing, as torch does.
const NORM_EPS: f64 = 1e-6;

struct SquaredNormVisitor<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: f64,
    _backend: std::marker::PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNormVisitor<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.total += (grad.clone() * grad).sum().into_scalar().elem::<f64>();
        }
    }
}

struct ScaleVisitor<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    scale: f64,
    _backend: std::marker::PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for ScaleVisitor<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: &ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register(id.clone(), grad.mul_scalar(self.scale));
        }
    }
}

/// Global L2 norm of the gradients of `module`. Parameters without a gradient (frozen
/// ones) are skipped.
pub fn grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let mut visitor = SquaredNormVisitor::<B> {
        grads,
        total: 0.0,
        _backend: std::marker::PhantomData,
    };
    module.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Rescales all gradients of `module` so that their global norm is at most `max_norm`.
/// Returns the clipped gradients and the norm measured before clipping.
pub fn clip_grad_norm<B, M>(
    module: &M,
    mut grads: GradientsParams,
    max_norm: f64,
) -> (GradientsParams, f64)
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    let total_norm = grad_norm::<B, M>(module, &grads);
    let clip_coef = max_norm / (total_norm + NORM_EPS);

    if clip_coef < 1.0 {
        let mut visitor = ScaleVisitor::<B> {
            grads: &mut grads,
            scale: clip_coef,
            _backend: std::marker::PhantomData,
        };
        module.visit(&mut visitor);
    }

    (grads, total_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::{Module, Param};
    use burn::tensor::backend::Backend;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[derive(Module, Debug)]
    struct TwoParams<B: Backend> {
        first: Param<Tensor<B, 1>>,
        second: Param<Tensor<B, 1>>,
    }

    struct Fixture {
        module: TwoParams<TestBackend>,
        grads: GradientsParams,
        first: ParamId,
        second: ParamId,
    }

    /// Module whose gradients are exactly `first_grad` and `second_grad`.
    fn fixture(first_grad: [f32; 2], second_grad: [f32; 2]) -> Fixture {
        let device = Default::default();
        let (first, second) = (ParamId::new(), ParamId::new());
        let module = TwoParams {
            first: Param::new(
                first.clone(),
                Tensor::<TestBackend, 1>::zeros([2], &device).require_grad(),
            ),
            second: Param::new(
                second.clone(),
                Tensor::<TestBackend, 1>::zeros([2], &device).require_grad(),
            ),
        };
        let loss = (module.first.val() * Tensor::from_floats(first_grad, &device)).sum()
            + (module.second.val() * Tensor::from_floats(second_grad, &device)).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &module);

        Fixture {
            module,
            grads,
            first,
            second,
        }
    }

    fn grad_values(grads: &GradientsParams, id: &ParamId) -> Vec<f32> {
        grads
            .get::<NdArray<f32>, 1>(id)
            .unwrap()
            .into_data()
            .convert::<f32>()
            .value
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-4, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn gradients_under_the_limit_individually_are_scaled_jointly() {
        // Each gradient has norm 0.8, the pair has norm 0.8 * sqrt(2).
        let Fixture { module, grads, first, second } = fixture([0.8, 0.0], [0.48, 0.64]);
        let (clipped, norm) = clip_grad_norm::<TestBackend, _>(&module, grads, 1.0);

        assert!((norm - 0.8 * 2f64.sqrt()).abs() < 1e-5);
        let scale = (1.0 / (0.8 * 2f64.sqrt())) as f32;
        assert_close(&grad_values(&clipped, &first), &[0.8 * scale, 0.0]);
        assert_close(&grad_values(&clipped, &second), &[0.48 * scale, 0.64 * scale]);
        assert!((grad_norm::<TestBackend, _>(&module, &clipped) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn gradients_within_the_limit_are_untouched() {
        let Fixture { module, grads, first, second } = fixture([0.3, 0.0], [0.0, 0.4]);
        let (clipped, norm) = clip_grad_norm::<TestBackend, _>(&module, grads, 1.0);

        assert!((norm - 0.5).abs() < 1e-6);
        assert_close(&grad_values(&clipped, &first), &[0.3, 0.0]);
        assert_close(&grad_values(&clipped, &second), &[0.0, 0.4]);
    }
}
