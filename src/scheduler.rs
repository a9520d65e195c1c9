//! Linear warmup followed by linear decay to zero.

use burn::{config::Config, lr_scheduler::LrScheduler, tensor::backend::Backend, LearningRate};

#[derive(Config)]
pub struct LinearLrSchedulerConfig {
    /// Peak learning rate, reached at the end of warmup.
    pub initial_lr: LearningRate,
    #[config(default = 0)]
    pub warmup_steps: usize,
    /// Step at which the rate reaches zero.
    pub total_steps: usize,
}

impl LinearLrSchedulerConfig {
    pub fn init(&self) -> LinearLrScheduler {
        LinearLrScheduler {
            initial_lr: self.initial_lr,
            warmup_steps: self.warmup_steps,
            total_steps: self.total_steps,
            current_step: 0,
        }
    }
}

/// Learning-rate schedule stepped once per optimizer update. Each `step` returns the
/// rate for the update about to happen, then advances:
///
/// - `t < warmup_steps`: `initial_lr * t / warmup_steps`
/// - otherwise: `initial_lr * max(0, (total_steps - t) / (total_steps - warmup_steps))`
#[derive(Clone, Debug)]
pub struct LinearLrScheduler {
    initial_lr: LearningRate,
    warmup_steps: usize,
    total_steps: usize,
    current_step: usize,
}

impl LinearLrScheduler {
    /// Rate the next `step` call will return.
    pub fn current_lr(&self) -> LearningRate {
        let step = self.current_step as f64;
        if self.current_step < self.warmup_steps {
            return self.initial_lr * step / self.warmup_steps as f64;
        }

        let decay_steps = self.total_steps.saturating_sub(self.warmup_steps);
        if decay_steps == 0 {
            return 0.0;
        }
        let remaining = self.total_steps.saturating_sub(self.current_step) as f64;
        self.initial_lr * (remaining / decay_steps as f64).max(0.0)
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }
}

impl<B: Backend> LrScheduler<B> for LinearLrScheduler {
    type Record = usize;

    fn step(&mut self) -> LearningRate {
        let lr = self.current_lr();
        self.current_step += 1;
        lr
    }

    fn to_record(&self) -> Self::Record {
        self.current_step
    }

    fn load_record(mut self, record: Self::Record) -> Self {
        self.current_step = record;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn next(scheduler: &mut LinearLrScheduler) -> LearningRate {
        LrScheduler::<TestBackend>::step(scheduler)
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} != {b}");
    }

    #[test]
    fn without_warmup_starts_at_base_rate_and_decays_to_zero() {
        let mut scheduler = LinearLrSchedulerConfig::new(1.0, 4).init();
        let rates: Vec<_> = (0..5).map(|_| next(&mut scheduler)).collect();
        assert_eq!(rates, vec![1.0, 0.75, 0.5, 0.25, 0.0]);
    }

    #[test]
    fn warmup_ramps_up_then_decays() {
        let mut scheduler = LinearLrSchedulerConfig::new(2.0, 6)
            .with_warmup_steps(2)
            .init();
        assert_close(next(&mut scheduler), 0.0);
        assert_close(next(&mut scheduler), 1.0);
        assert_close(next(&mut scheduler), 2.0);
        assert_close(next(&mut scheduler), 1.5);
        assert_eq!(scheduler.current_step(), 4);
    }

    #[test]
    fn rate_stays_at_zero_past_the_last_step() {
        let mut scheduler = LinearLrSchedulerConfig::new(5e-5, 2).init();
        (0..10).for_each(|_| {
            next(&mut scheduler);
        });
        assert_close(scheduler.current_lr(), 0.0);
    }

    #[test]
    fn empty_schedule_never_updates() {
        assert_close(next(&mut LinearLrSchedulerConfig::new(5e-5, 0).init()), 0.0);
    }

    #[test]
    fn record_resumes_the_schedule() {
        let mut scheduler = LinearLrSchedulerConfig::new(1.0, 4).init();
        next(&mut scheduler);
        next(&mut scheduler);
        let record = LrScheduler::<TestBackend>::to_record(&scheduler);

        let resumed = LrScheduler::<TestBackend>::load_record(
            LinearLrSchedulerConfig::new(1.0, 4).init(),
            record,
        );
        assert_eq!(resumed.current_step(), 2);
        assert_close(resumed.current_lr(), 0.5);
    }
}
