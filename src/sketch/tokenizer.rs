//! Language-aware tokenization for similarity sketches

use std::collections::HashSet;
use once_cell::sync::Lazy;

/// Tokenizer trait for different segmentation strategies
pub trait Tokenizer: Send + Sync {
    /// Split text into normalized tokens
    fn tokenize(&self, text: &str) -> Vec<String>;
}

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "has",
        "have", "in", "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was",
        "were", "which", "with", "will",
        // Chinese
        "的", "了", "是", "在", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上",
        "也", "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这",
        "那", "里", "来", "他", "她", "它", "们", "什么", "为", "与", "等", "或", "及", "之",
        "其", "而", "但", "如", "被", "将", "把", "从", "向", "对", "于", "以", "可", "能",
        "所", "这个", "那个", "这些", "那些", "因为", "所以", "如果", "虽然", "但是", "然而",
        "因此", "例如", "比如", "即", "且", "又", "还", "已", "已经", "正在", "可以", "应该",
        "必须", "需要", "进行", "通过", "根据", "按照", "关于", "对于", "以及", "并且",
        "或者", "而且",
    ]
    .into_iter()
    .collect()
});

/// CJK unified ideographs, extension A and compatibility ideographs
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fff}' | '\u{3400}'..='\u{4dbf}' | '\u{f900}'..='\u{faff}')
}

/// Mixed-script tokenizer
///
/// Latin/numeric runs become lowercase word tokens. CJK runs, which carry
/// no whitespace, become overlapping character bigrams. Stop words and
/// tokens shorter than `min_token_chars` characters are dropped.
pub struct MixedScriptTokenizer {
    min_token_chars: usize,
}

impl MixedScriptTokenizer {
    pub fn new(min_token_chars: usize) -> Self {
        Self { min_token_chars }
    }

    fn flush_word(&self, word: &mut String, out: &mut Vec<String>) {
        if !word.is_empty() {
            out.push(word.to_lowercase());
            word.clear();
        }
    }

    fn flush_cjk(&self, run: &mut Vec<char>, out: &mut Vec<String>) {
        match run.len() {
            0 => {}
            1 => out.push(run[0].to_string()),
            _ => out.extend(run.windows(2).map(|w| w.iter().collect::<String>())),
        }
        run.clear();
    }

    fn keep(&self, token: &str) -> bool {
        token.chars().count() >= self.min_token_chars && !STOPWORDS.contains(token)
    }
}

impl Default for MixedScriptTokenizer {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Tokenizer for MixedScriptTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut raw = Vec::new();
        let mut word = String::new();
        let mut cjk_run = Vec::new();

        for c in text.chars() {
            if is_cjk(c) {
                self.flush_word(&mut word, &mut raw);
                cjk_run.push(c);
            } else if c.is_alphanumeric() {
                self.flush_cjk(&mut cjk_run, &mut raw);
                word.push(c);
            } else {
                self.flush_word(&mut word, &mut raw);
                self.flush_cjk(&mut cjk_run, &mut raw);
            }
        }
        self.flush_word(&mut word, &mut raw);
        self.flush_cjk(&mut cjk_run, &mut raw);

        raw.retain(|t| self.keep(t));
        raw
    }
}

/// Whitespace tokenizer, mostly useful in tests and for pre-segmented text
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(|t| t.to_lowercase()).collect()
    }
}
