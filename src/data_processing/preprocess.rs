// Text cleaning applied before tokenization. `text_preprocessing_simple` is the light
// pass used in front of the BERT tokenizer (mentions, HTML ampersands, whitespace);
// `text_preprocessing` is the heavier pass used for bag-of-words features, which also
// lowercases, expands contractions, strips punctuation and drops English stop words.

/// NLTK English stop words.
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
    "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
    "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
    "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
    "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain",
    "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn",
    "hadn't", "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn",
    "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't", "shouldn",
    "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn", "wouldn't",
];

/// Stop words that carry sentiment and are kept anyway.
const KEPT_STOP_WORDS: &[&str] = &["not", "can"];

/// Whole-word contractions whose expansion is irregular.
const IRREGULAR_CONTRACTIONS: &[(&str, &str)] = &[
    ("can't", "cannot"),
    ("won't", "will not"),
    ("shan't", "shall not"),
    ("ain't", "is not"),
    ("let's", "let us"),
    ("y'all", "you all"),
    ("ma'am", "madam"),
];

/// Suffix rules, checked in order.
const CONTRACTION_SUFFIXES: &[(&str, &str)] = &[
    ("n't", " not"),
    ("'re", " are"),
    ("'ve", " have"),
    ("'ll", " will"),
    ("'m", " am"),
    ("'d", " would"),
    ("'s", " is"),
];

/// Light cleaning used before BERT tokenization: drops `@mention` tokens, decodes
/// `&amp;` and collapses whitespace.
pub fn text_preprocessing_simple(text: &str) -> String {
    let text = remove_mentions(text).replace("&amp;", "&");
    collapse_whitespace(&text)
}

/// Full cleaning used for bag-of-words features.
pub fn text_preprocessing(text: &str) -> String {
    let lowered = text.replace('\u{2019}', "'").to_lowercase();
    let expanded = lowered
        .split_whitespace()
        .map(expand_contraction)
        .collect::<Vec<_>>()
        .join(" ");
    let without_mentions = remove_mentions(&expanded);

    // '?' stays as its own token; any other non-word character becomes a separator.
    let mut stripped = String::with_capacity(without_mentions.len());
    for c in without_mentions.chars() {
        match c {
            '?' => stripped.push_str(" ? "),
            c if c.is_alphanumeric() || c == '_' || c.is_whitespace() => stripped.push(c),
            _ => stripped.push(' '),
        }
    }

    stripped
        .split_whitespace()
        .filter(|word| !is_stop_word(word) || KEPT_STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace word tokenizer used by the bag-of-words vectorizer.
pub fn word_tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn expand_contraction(word: &str) -> String {
    if let Some((_, expanded)) = IRREGULAR_CONTRACTIONS.iter().find(|(c, _)| *c == word) {
        return expanded.to_string();
    }
    for (suffix, replacement) in CONTRACTION_SUFFIXES {
        if let Some(stem) = word.strip_suffix(suffix) {
            if !stem.is_empty() {
                return format!("{stem}{replacement}");
            }
        }
    }
    word.to_string()
}

// An '@' starts a mention that runs up to and including the next whitespace character.
// A trailing mention with no whitespace after it is left untouched.
fn remove_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let mention = &rest[at..];
        match mention.char_indices().find(|(_, c)| c.is_whitespace()) {
            Some((end, c)) => {
                out.push(' ');
                rest = &mention[end + c.len_utf8()..];
            }
            None => {
                out.push_str(mention);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_preprocessing_drops_mentions_and_decodes_ampersands() {
        let cleaned = text_preprocessing_simple("@united thanks  for nothing &amp; more\n");
        assert_eq!(cleaned, "thanks for nothing & more");
    }

    #[test]
    fn simple_preprocessing_keeps_trailing_mention() {
        assert_eq!(text_preprocessing_simple("ping @bob"), "ping @bob");
    }

    #[test]
    fn simple_preprocessing_of_blank_text_is_empty() {
        assert_eq!(text_preprocessing_simple(" \t\n "), "");
    }

    #[test]
    fn full_preprocessing_expands_contractions_and_keeps_negation() {
        let cleaned = text_preprocessing("I DON'T like the service, it's slow!");
        assert_eq!(cleaned, "not like service slow");
    }

    #[test]
    fn full_preprocessing_keeps_question_marks_and_can() {
        let cleaned = text_preprocessing("Can you help me?");
        assert_eq!(cleaned, "can help ?");
    }

    #[test]
    fn irregular_contractions_are_expanded() {
        assert_eq!(expand_contraction("won't"), "will not");
        assert_eq!(expand_contraction("they're"), "they are");
        assert_eq!(expand_contraction("'s"), "'s");
    }

    #[test]
    fn word_tokenize_splits_on_whitespace() {
        assert_eq!(word_tokenize(" a  b\tc "), vec!["a", "b", "c"]);
    }
}
