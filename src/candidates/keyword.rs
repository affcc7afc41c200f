//! Keyword-pattern pair generation
//!
//! Each pattern holds two phrase sets describing the two sides of a
//! contradiction that recurs in real reports ("fully compliant" against
//! "does not meet"). Any fact mentioning a side-A phrase is paired with any
//! fact mentioning a side-B phrase.
//!
//! Latin-script phrases match on word boundaries only. A side-B phrase that
//! falls inside a side-A phrase of the same fact ("funding gap" within
//! "no funding gap") does not count as a side-B mention.

use super::{CandidatePair, PairKey, PairOrigin};
use crate::config::{KeywordConfig, KeywordPattern};
use crate::facts::Fact;
use std::collections::HashSet;
use tracing::debug;

/// Built-in contradiction patterns, English and Chinese
pub fn builtin_patterns() -> Vec<KeywordPattern> {
    vec![
        KeywordPattern::new(
            "compliance",
            &["fully compliant", "complies with", "meets the requirements", "in line with policy"],
            &["not compliant", "non-compliant", "does not meet", "fails to meet", "updated guideline", "revised guideline"],
        ),
        KeywordPattern::new(
            "resident_coordination",
            &["coordination completed", "coordination is complete"],
            &["residents object", "resident opposition", "delayed rollout", "privacy concerns"],
        ),
        KeywordPattern::new(
            "funding_gap",
            &["no funding gap", "funding is sufficient", "cash flow is normal"],
            &["risk of shutdown", "funding gap", "only partially funded", "shortfall"],
        ),
        KeywordPattern::new(
            "completion_timeline",
            &["may be delayed", "delayed until", "pushed back to"],
            &["ahead of schedule", "on schedule", "trial operation by"],
        ),
        KeywordPattern::new(
            "workforce",
            &["no layoffs", "zero layoffs", "hiring", "headcount growth"],
            &["layoffs", "job cuts", "redundancies", "restructuring"],
        ),
        KeywordPattern::new(
            "trend",
            &["increased", "grew", "growth", "rose", "up by"],
            &["decreased", "declined", "fell", "dropped", "down by"],
        ),
        KeywordPattern::new(
            "safety",
            &["no incidents", "zero incidents", "never experienced a breach", "fully secure"],
            &["breach", "incident", "violation", "fined", "leak"],
        ),
        KeywordPattern::new(
            "emissions",
            &["zero emissions", "carbon neutral", "reduced emissions"],
            &["emissions increased", "pollution", "missed the target"],
        ),
        KeywordPattern::new(
            "合规",
            &["落实国家及省级政策", "符合政策", "落实政策", "符合要求"],
            &["不符", "未达到指南要求", "修订版", "2024年修订版"],
        ),
        KeywordPattern::new(
            "居民协调",
            &["已完成协调", "协调工作已完成"],
            &["居民反对", "延迟推进", "隐私", "延迟安装"],
        ),
        KeywordPattern::new(
            "资金缺口",
            &["无资金缺口", "资金周转正常"],
            &["停工风险", "仅到位", "资金缺口", "阶段性资金缺口可控"],
        ),
        KeywordPattern::new(
            "竣工时间",
            &["可能导致项目整体竣工时间延迟", "可能延迟至"],
            &["调整为", "3月底前投入试运行", "提前完成"],
        ),
        KeywordPattern::new(
            "医疗预约",
            &["医疗预约闭环服务", "闭环服务"],
            &["无法与", "无法对接", "仍需线下排队"],
        ),
        KeywordPattern::new(
            "裁员",
            &["零裁员", "不裁员", "增加员工", "招聘"],
            &["裁员", "裁撤", "离职", "减少岗位", "重组"],
        ),
        KeywordPattern::new(
            "环保",
            &["零排放", "碳中和", "减少排放"],
            &["排放增加", "污染", "未达到", "增加废弃物"],
        ),
        KeywordPattern::new(
            "趋势",
            &["增长", "上升", "提高", "增加", "攀升"],
            &["下降", "下滑", "减少", "降低", "缩减", "跌落"],
        ),
        KeywordPattern::new(
            "安全",
            &["未发生", "零事故", "合规", "遵守"],
            &["泄露", "违规", "事故", "违反", "被罚"],
        ),
        KeywordPattern::new(
            "前期筹备",
            &["前期筹备工作已全部完成"],
            &["未办理施工许可证", "未办结"],
        ),
        KeywordPattern::new(
            "安防",
            &["全方位安全防护网络", "覆盖社区出入口"],
            &["识别成功率仅", "无法实现实时画面传输", "无法实时传输"],
        ),
    ]
}

/// Keyword and percentage-spread pair generator
pub struct KeywordGenerator {
    patterns: Vec<KeywordPattern>,
    percent_topics: Vec<String>,
    percent_spread: f64,
    max_pairs: usize,
}

impl KeywordGenerator {
    pub fn new(config: &KeywordConfig) -> Self {
        let mut patterns = if config.include_builtin {
            builtin_patterns()
        } else {
            Vec::new()
        };
        patterns.extend(config.patterns.iter().cloned());

        let lower = |phrases: &[String]| phrases.iter().map(|p| p.to_lowercase()).collect::<Vec<_>>();
        let patterns = patterns
            .into_iter()
            .map(|p| KeywordPattern {
                side_a: lower(&p.side_a),
                side_b: lower(&p.side_b),
                name: p.name,
            })
            .collect();

        Self {
            patterns,
            percent_topics: config.percent_topics.iter().map(|t| t.to_lowercase()).collect(),
            percent_spread: config.percent_spread,
            max_pairs: config.max_pairs,
        }
    }

    pub fn patterns(&self) -> &[KeywordPattern] {
        &self.patterns
    }

    /// Unordered-unique pairs, pattern order first, capped
    pub fn generate(&self, facts: &[&Fact]) -> Vec<CandidatePair> {
        let texts: Vec<String> = facts.iter().map(|f| f.similarity_text().to_lowercase()).collect();

        let mut pairs = Vec::new();
        let mut seen: HashSet<PairKey> = HashSet::new();
        let mut push = |a: &Fact, b: &Fact, pairs: &mut Vec<CandidatePair>| -> bool {
            if a.id == b.id {
                return false;
            }
            let pair = CandidatePair::new(&a.id, &b.id, PairOrigin::Keyword);
            if seen.insert(pair.key()) {
                pairs.push(pair);
            }
            pairs.len() >= self.max_pairs
        };

        for pattern in &self.patterns {
            let a_spans: Vec<Vec<Span>> = texts.iter().map(|text| phrase_spans(text, &pattern.side_a)).collect();
            let side_a: Vec<usize> = (0..texts.len()).filter(|&i| !a_spans[i].is_empty()).collect();
            if side_a.is_empty() {
                continue;
            }
            let side_b: Vec<usize> = texts
                .iter()
                .enumerate()
                .filter(|(i, text)| {
                    phrase_spans(text, &pattern.side_b)
                        .iter()
                        .any(|b| !a_spans[*i].iter().any(|a| a.0 <= b.0 && b.1 <= a.1))
                })
                .map(|(i, _)| i)
                .collect();
            for &i in &side_a {
                for &j in &side_b {
                    if push(facts[i], facts[j], &mut pairs) {
                        debug!("Keyword pair cap {} reached in pattern {}", self.max_pairs, pattern.name);
                        return pairs;
                    }
                }
            }
        }

        for topic in &self.percent_topics {
            let on_topic: Vec<(usize, Vec<f64>)> = texts
                .iter()
                .enumerate()
                .filter(|(_, text)| !phrase_spans(text, std::slice::from_ref(topic)).is_empty())
                .map(|(i, text)| (i, percent_values(text)))
                .filter(|(_, values)| !values.is_empty())
                .collect();

            for x in 0..on_topic.len() {
                for y in (x + 1)..on_topic.len() {
                    let (i, ref pa) = on_topic[x];
                    let (j, ref pb) = on_topic[y];
                    let spread = pa.iter().any(|a| pb.iter().any(|b| (a - b).abs() >= self.percent_spread));
                    if spread && push(facts[i], facts[j], &mut pairs) {
                        return pairs;
                    }
                }
            }
        }

        pairs
    }
}

/// Byte range of a phrase match
type Span = (usize, usize);

/// Every match of any phrase in `text`
fn phrase_spans(text: &str, phrases: &[String]) -> Vec<Span> {
    let mut spans = Vec::new();
    for phrase in phrases.iter().filter(|p| !p.is_empty()) {
        let bounded = phrase.is_ascii();
        for (start, matched) in text.match_indices(phrase.as_str()) {
            let end = start + matched.len();
            let on_edges = is_word_edge(text[..start].chars().next_back()) && is_word_edge(text[end..].chars().next());
            if bounded && !on_edges {
                continue;
            }
            spans.push((start, end));
        }
    }
    spans
}

fn is_word_edge(neighbour: Option<char>) -> bool {
    neighbour.map_or(true, |c| !c.is_alphanumeric())
}

/// Numbers written immediately before a `%` sign
pub fn percent_values(text: &str) -> Vec<f64> {
    let chars: Vec<char> = text.chars().collect();
    let mut values = Vec::new();

    for (pos, &c) in chars.iter().enumerate() {
        if c != '%' && c != '％' {
            continue;
        }
        let mut start = pos;
        while start > 0 && (chars[start - 1].is_ascii_digit() || chars[start - 1] == '.') {
            start -= 1;
        }
        let number: String = chars[start..pos].iter().collect();
        if let Ok(value) = number.trim_start_matches('.').parse::<f64>() {
            values.push(value);
        }
    }

    values
}
