//! Adaptive reply-length limiter.
//!
//! Models follow "answer in N words" loosely, so the limiter checks the reply
//! and, while it is over budget, asks the model to shorten its latest attempt.
//! Shortening is not monotonic: the best candidate seen is kept, not the last.

use colloquy_config::LimiterConfig;
use colloquy_core::error::ProviderError;
use colloquy_core::provider::{ChatProvider, ChatReply, ChatRequest};
use tracing::{debug, info};

/// Character and word budgets for a reply. A zero budget is unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthLimiter {
    pub max_chars: usize,
    pub max_words: usize,
    /// Shortening calls allowed after the initial call.
    pub max_attempts: u32,
    /// Scales the requested shrink percentage, so the model aims slightly short.
    pub shrink_multiplier: f64,
}

impl Default for LengthLimiter {
    fn default() -> Self {
        Self {
            max_chars: 0,
            max_words: 0,
            max_attempts: 5,
            shrink_multiplier: 0.95,
        }
    }
}

/// Character and word counts of one candidate, with its fit against the budgets.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Measure {
    chars: usize,
    words: usize,
    /// `budget / actual`, minimised over the budgets that are set. At or above
    /// 1.0 the text fits.
    ratio: f64,
}

impl LengthLimiter {
    pub fn new(max_chars: usize, max_words: usize) -> Self {
        Self {
            max_chars,
            max_words,
            ..Self::default()
        }
    }

    pub fn from_config(config: &LimiterConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            max_words: config.max_words,
            max_attempts: config.max_attempts,
            shrink_multiplier: config.shrink_multiplier,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_chars == 0 && self.max_words == 0
    }

    /// Run `request` through `provider`, shortening the reply to fit.
    ///
    /// Replies without prose text pass through untouched. Every field other than
    /// `text` comes from the first reply.
    pub async fn limit(
        &self,
        provider: &dyn ChatProvider,
        request: ChatRequest,
    ) -> Result<ChatReply, ProviderError> {
        if self.is_unbounded() {
            return provider.chat(request).await;
        }

        let mut reply = provider.chat(request.clone()).await?;
        let Some(first) = reply.text.clone() else {
            debug!("Reply carries no text; skipping length limit");
            return Ok(reply);
        };

        let mut measure = self.measure(&first);
        let mut shrink_qty = next_shrink(1.0, measure.ratio);
        let mut latest = first.clone();
        let mut best = (first, measure.ratio);
        let mut attempts = 0;

        while self.exceeds(&measure) && attempts < self.max_attempts {
            attempts += 1;
            debug!(
                attempt = attempts,
                chars = measure.chars,
                words = measure.words,
                shrink_pct = percent(self.shrink_multiplier * shrink_qty),
                "Reply over budget; asking for a shorter version"
            );

            let prompt = self.shorten_prompt(&latest, shrink_qty);
            let shortened = provider.chat(request.with_message(prompt)).await?;
            let Some(text) = shortened.text else {
                debug!("Shortening call returned no text; stopping");
                break;
            };

            measure = self.measure(&text);
            shrink_qty = next_shrink(shrink_qty, measure.ratio);
            if measure.ratio > best.1 {
                best = (text.clone(), measure.ratio);
            }
            latest = text;
        }

        info!(
            shorten_calls = attempts,
            chars = best.0.chars().count(),
            max_chars = self.max_chars,
            max_words = self.max_words,
            fits = best.1 >= 1.0,
            "Length limit applied"
        );
        reply.text = Some(best.0);
        Ok(reply)
    }

    fn measure(&self, text: &str) -> Measure {
        let chars = text.chars().count();
        let words = count_words(text);

        let mut ratio = f64::INFINITY;
        if self.max_chars > 0 {
            ratio = ratio.min(self.max_chars as f64 / chars.max(1) as f64);
        }
        if self.max_words > 0 {
            ratio = ratio.min(self.max_words as f64 / words.max(1) as f64);
        }

        Measure {
            chars,
            words,
            ratio,
        }
    }

    fn exceeds(&self, measure: &Measure) -> bool {
        (self.max_chars > 0 && measure.chars > self.max_chars)
            || (self.max_words > 0 && measure.words > self.max_words)
    }

    fn shorten_prompt(&self, text: &str, shrink_qty: f64) -> String {
        format!(
            "Shorten this text by {}% while keeping the same style and tone. \
             Preserve as much of the content as possible while shortening it by {}%. \
             The text to shorten:\n{}",
            percent(self.shrink_multiplier * shrink_qty),
            percent(shrink_qty),
            text
        )
    }
}

/// Words after treating hyphens as spaces, so "well-known" counts as two.
pub fn count_words(text: &str) -> usize {
    text.replace('-', " ").split_whitespace().count()
}

fn next_shrink(shrink_qty: f64, ratio: f64) -> f64 {
    (shrink_qty * (1.0 - ratio)).clamp(0.0, 1.0)
}

fn percent(fraction: f64) -> u32 {
    (fraction * 100.0).round() as u32
}
