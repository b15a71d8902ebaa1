//! Keyword filter guard and its compiled-pattern cache.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Guard, GuardContext, GuardResult, parse_params};
use crate::config::CacheKeyPolicy;

/// What distinguishes one cached pattern set from another within a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheShape {
    Lengths { patterns: usize, keywords: usize },
    Content(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    chat_id: String,
    shape: CacheShape,
}

/// Compiled matchers per chat, so patterns are not recompiled per message.
///
/// Under [`CacheKeyPolicy::ListLength`] an edit that keeps both list
/// lengths unchanged keeps serving the old matchers for the life of the
/// process. Under [`CacheKeyPolicy::ContentHash`] a miss replaces whatever
/// the chat had cached before.
pub struct PatternCache {
    policy: CacheKeyPolicy,
    entries: Mutex<HashMap<CacheKey, Arc<[Regex]>>>,
}

impl PatternCache {
    pub fn new(policy: CacheKeyPolicy) -> Arc<Self> {
        Arc::new(Self {
            policy,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Matchers for this chat's patterns and keywords, compiling on a miss.
    pub fn compiled(
        &self,
        chat_id: &str,
        patterns: &[String],
        keywords: &[String],
    ) -> Arc<[Regex]> {
        let key = CacheKey {
            chat_id: chat_id.to_string(),
            shape: self.shape(patterns, keywords),
        };

        if let Some(hit) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(hit);
        }

        let compiled: Arc<[Regex]> = compile(chat_id, patterns, keywords).into();
        debug!(
            chat_id = %chat_id,
            matchers = compiled.len(),
            "Compiled keyword filter patterns"
        );
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(self.policy, CacheKeyPolicy::ContentHash) {
            // A chat has one current pattern set; older hashes never hit again.
            entries.retain(|k, _| k.chat_id != key.chat_id);
        }
        entries.entry(key).or_insert(compiled).clone()
    }

    /// Number of cached pattern sets.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape(&self, patterns: &[String], keywords: &[String]) -> CacheShape {
        match self.policy {
            CacheKeyPolicy::ListLength => CacheShape::Lengths {
                patterns: patterns.len(),
                keywords: keywords.len(),
            },
            CacheKeyPolicy::ContentHash => {
                let mut hasher = DefaultHasher::new();
                patterns.hash(&mut hasher);
                keywords.hash(&mut hasher);
                CacheShape::Content(hasher.finish())
            }
        }
    }
}

/// Compile regex patterns and whole-word keywords, case-insensitively.
/// Patterns that fail to compile are skipped.
fn compile(chat_id: &str, patterns: &[String], keywords: &[String]) -> Vec<Regex> {
    let mut compiled = Vec::with_capacity(patterns.len() + keywords.len());

    for pattern in patterns {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => compiled.push(re),
            Err(e) => {
                warn!(
                    chat_id = %chat_id,
                    pattern = %pattern,
                    error = %e,
                    "Skipping invalid keyword filter pattern"
                );
            }
        }
    }

    for keyword in keywords {
        if keyword.trim().is_empty() {
            continue;
        }
        let whole_word = format!(r"\b{}\b", regex::escape(keyword));
        match RegexBuilder::new(&whole_word).case_insensitive(true).build() {
            Ok(re) => compiled.push(re),
            Err(e) => {
                warn!(chat_id = %chat_id, keyword = %keyword, error = %e, "Skipping keyword");
            }
        }
    }

    compiled
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeywordFilterParams {
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Block messages matching configured keywords or regex patterns.
pub struct KeywordFilterGuard {
    cache: Arc<PatternCache>,
}

impl KeywordFilterGuard {
    pub fn new(cache: Arc<PatternCache>) -> Self {
        Self { cache }
    }
}

impl Guard for KeywordFilterGuard {
    fn id(&self) -> &str {
        "keyword-filter"
    }

    fn name(&self) -> &str {
        "Keyword Filter"
    }

    fn description(&self) -> &str {
        "Block messages matching keyword/regex patterns. Set params.keywords (string[]) and/or params.patterns (regex string[])."
    }

    fn evaluate(&self, ctx: &GuardContext<'_>) -> GuardResult {
        if ctx.text.is_empty() {
            return GuardResult::Pass;
        }

        let params: KeywordFilterParams = parse_params(ctx);
        let compiled = self
            .cache
            .compiled(ctx.chat_id, &params.patterns, &params.keywords);

        if compiled.iter().any(|re| re.is_match(&ctx.text)) {
            return GuardResult::block(self.id(), "Your message was blocked by a content filter.");
        }
        GuardResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;
    use crate::guards::EvaluationContext;
    use crate::guards::testing::{CHAT, SENDER, at, text_message};
    use serde_json::json;

    fn blocked(guard: &KeywordFilterGuard, config: &GuardConfig, text: &str) -> bool {
        let msg = text_message(text);
        let ctx = EvaluationContext::build(&msg, CHAT, SENDER, false, at(12, 0, 0));
        guard.evaluate(&ctx.bind(config)).is_blocked()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keywords_match_whole_words_case_insensitively() {
        let guard = KeywordFilterGuard::new(PatternCache::new(CacheKeyPolicy::ListLength));
        let config = GuardConfig::with_params("keyword-filter", json!({"keywords": ["spam"]}));

        assert!(blocked(&guard, &config, "this is SPAM here"));
        assert!(!blocked(&guard, &config, "spammer"));
    }

    #[test]
    fn keywords_are_escaped() {
        let guard = KeywordFilterGuard::new(PatternCache::new(CacheKeyPolicy::ListLength));
        let config = GuardConfig::with_params("keyword-filter", json!({"keywords": ["a.b"]}));

        assert!(blocked(&guard, &config, "say a.b now"));
        assert!(!blocked(&guard, &config, "say axb now"));
    }

    #[test]
    fn patterns_are_case_insensitive_regexes() {
        let guard = KeywordFilterGuard::new(PatternCache::new(CacheKeyPolicy::ListLength));
        let config = GuardConfig::with_params(
            "keyword-filter",
            json!({"patterns": [r"free\s+crypto"]}),
        );

        assert!(blocked(&guard, &config, "Get FREE   Crypto today"));
        assert!(!blocked(&guard, &config, "crypto is not free"));
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let guard = KeywordFilterGuard::new(PatternCache::new(CacheKeyPolicy::ListLength));
        let config = GuardConfig::with_params(
            "keyword-filter",
            json!({"patterns": ["(unclosed", "casino"]}),
        );

        assert!(blocked(&guard, &config, "online casino"));
        assert!(!blocked(&guard, &config, "(unclosed"));
    }

    #[test]
    fn empty_text_and_empty_config_pass() {
        let cache = PatternCache::new(CacheKeyPolicy::ListLength);
        let guard = KeywordFilterGuard::new(Arc::clone(&cache));

        assert!(!blocked(&guard, &GuardConfig::new("keyword-filter"), "anything"));
        let config = GuardConfig::with_params("keyword-filter", json!({"keywords": ["x"]}));
        assert!(!blocked(&guard, &config, ""));
    }

    #[test]
    fn length_keyed_cache_reuses_equal_length_edits() {
        let cache = PatternCache::new(CacheKeyPolicy::ListLength);

        let first = cache.compiled(CHAT, &[], &strings(&["spam"]));
        let edited = cache.compiled(CHAT, &[], &strings(&["scam"]));
        assert!(Arc::ptr_eq(&first, &edited));
        assert!(edited[0].is_match("spam"));
        assert_eq!(cache.len(), 1);

        let grown = cache.compiled(CHAT, &[], &strings(&["scam", "fraud"]));
        assert_eq!(grown.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn content_keyed_cache_sees_edits() {
        let cache = PatternCache::new(CacheKeyPolicy::ContentHash);

        let first = cache.compiled(CHAT, &[], &strings(&["spam"]));
        let edited = cache.compiled(CHAT, &[], &strings(&["scam"]));
        assert!(!Arc::ptr_eq(&first, &edited));
        assert!(edited[0].is_match("scam"));
        assert!(!edited[0].is_match("spam"));

        let again = cache.compiled(CHAT, &[], &strings(&["scam"]));
        assert!(Arc::ptr_eq(&edited, &again));
    }

    #[test]
    fn content_keyed_cache_keeps_one_set_per_chat() {
        let cache = PatternCache::new(CacheKeyPolicy::ContentHash);
        cache.compiled("other@g.us", &[], &strings(&["spam"]));

        for word in ["one", "two", "three", "four"] {
            cache.compiled(CHAT, &[], &strings(&[word]));
        }
        assert_eq!(cache.len(), 2);

        let current = cache.compiled(CHAT, &[], &strings(&["four"]));
        assert!(current[0].is_match("four"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_is_per_chat() {
        let cache = PatternCache::new(CacheKeyPolicy::ListLength);
        cache.compiled("a@g.us", &[], &strings(&["spam"]));
        cache.compiled("b@g.us", &[], &strings(&["scam"]));
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_empty());
    }
}
