//! Document type classification from weighted textual signatures.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::config::{SignaturePattern, TypeSignature};
use crate::error::ConfigIssue;
use crate::normalize::text::fold_width;

/// A document type with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredType {
    pub doc_type: String,
    pub confidence: f64,
}

/// Result of classifying one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    Classified { doc_type: String, confidence: f64 },
    /// No signature reached its threshold; `best` is kept for diagnostics.
    Unclassified { best: Option<ScoredType> },
}

impl Classification {
    pub fn doc_type(&self) -> Option<&str> {
        match self {
            Classification::Classified { doc_type, .. } => Some(doc_type.as_str()),
            Classification::Unclassified { .. } => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Classification::Classified { .. })
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Width-folded, whitespace-free substring.
    Substring(String),
    Regex(Regex),
}

#[derive(Debug, Clone)]
struct CompiledSignature {
    doc_type: String,
    threshold: f64,
    matchers: Vec<(Matcher, f64)>,
    total_weight: f64,
}

/// Scores text against every signature in declaration order.
#[derive(Debug, Clone, Default)]
pub struct DocumentClassifier {
    signatures: Vec<CompiledSignature>,
}

impl DocumentClassifier {
    /// Compile signatures, reporting every invalid one.
    pub fn from_signatures(signatures: &[TypeSignature]) -> Result<Self, Vec<ConfigIssue>> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(signatures.len());

        for (i, signature) in signatures.iter().enumerate() {
            let entry = format!("signature[{}] {}", i, signature.doc_type);
            let before = issues.len();

            if signature.doc_type.trim().is_empty() {
                issues.push(ConfigIssue::new(&entry, "empty doc_type"));
            } else if !seen.insert(signature.doc_type.as_str()) {
                issues.push(ConfigIssue::new(&entry, "duplicate doc_type"));
            }
            if signature.patterns.is_empty() {
                issues.push(ConfigIssue::new(&entry, "no patterns"));
            }
            if !(0.0..=1.0).contains(&signature.threshold) {
                issues.push(ConfigIssue::new(
                    &entry,
                    format!("threshold {} outside [0, 1]", signature.threshold),
                ));
            }

            let mut matchers = Vec::with_capacity(signature.patterns.len());
            for pattern in &signature.patterns {
                match compile_pattern(pattern) {
                    Ok(matcher) => matchers.push((matcher, pattern.weight())),
                    Err(problem) => issues.push(ConfigIssue::new(&entry, problem)),
                }
            }

            if issues.len() == before {
                let total_weight = matchers.iter().map(|(_, w)| w).sum();
                compiled.push(CompiledSignature {
                    doc_type: signature.doc_type.clone(),
                    threshold: signature.threshold,
                    matchers,
                    total_weight,
                });
            }
        }

        if issues.is_empty() {
            Ok(Self {
                signatures: compiled,
            })
        } else {
            Err(issues)
        }
    }

    /// Known document type ids, in declaration order.
    pub fn doc_types(&self) -> impl Iterator<Item = &str> {
        self.signatures.iter().map(|s| s.doc_type.as_str())
    }

    /// Confidence of every signature, in declaration order.
    pub fn scores(&self, text: &str) -> Vec<ScoredType> {
        let folded = fold_width(text);
        let compact: String = folded.chars().filter(|c| !c.is_whitespace()).collect();

        self.signatures
            .iter()
            .map(|signature| {
                let matched: f64 = signature
                    .matchers
                    .iter()
                    .filter(|(matcher, _)| match matcher {
                        Matcher::Substring(needle) => compact.contains(needle.as_str()),
                        Matcher::Regex(re) => re.is_match(&folded),
                    })
                    .map(|(_, weight)| weight)
                    .sum();
                let confidence = if signature.total_weight > 0.0 {
                    matched / signature.total_weight
                } else {
                    0.0
                };
                ScoredType {
                    doc_type: signature.doc_type.clone(),
                    confidence,
                }
            })
            .collect()
    }

    /// Pick the highest-confidence type that clears its own threshold.
    /// Equal confidences resolve to the signature declared first.
    pub fn classify_text(&self, text: &str) -> Classification {
        let scores = self.scores(text);
        for score in &scores {
            debug!("signature {}: {:.3}", score.doc_type, score.confidence);
        }

        let winner = scores
            .iter()
            .zip(&self.signatures)
            .filter(|(score, signature)| score.confidence >= signature.threshold)
            .map(|(score, _)| score)
            .fold(None, pick_first_best);

        match winner {
            Some(score) => Classification::Classified {
                doc_type: score.doc_type.clone(),
                confidence: score.confidence,
            },
            None => Classification::Unclassified {
                best: scores.iter().fold(None, pick_first_best).cloned(),
            },
        }
    }
}

fn pick_first_best<'a>(best: Option<&'a ScoredType>, score: &'a ScoredType) -> Option<&'a ScoredType> {
    match best {
        Some(current) if current.confidence >= score.confidence => Some(current),
        _ => Some(score),
    }
}

fn compile_pattern(pattern: &SignaturePattern) -> Result<Matcher, String> {
    if pattern.weight() <= 0.0 {
        return Err(format!("pattern {:?} has non-positive weight", pattern.pattern()));
    }
    if pattern.is_regex() {
        return Regex::new(pattern.pattern())
            .map(Matcher::Regex)
            .map_err(|e| format!("invalid regex {:?}: {}", pattern.pattern(), e));
    }
    let needle: String = fold_width(pattern.pattern())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if needle.is_empty() {
        return Err("empty pattern".to_string());
    }
    Ok(Matcher::Substring(needle))
}
