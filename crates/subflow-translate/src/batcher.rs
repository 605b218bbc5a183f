//! Batch translation orchestration.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use subflow_models::SubtitleEntry;

use crate::engine::TranslationEngine;
use crate::error::{TranslateError, TranslateResult};
use crate::parse::{align_batch, parse_numbered_response};
use crate::reflow::reflow;

/// Batcher configuration.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Entries per engine call
    pub batch_size: usize,
    /// Attempts per batch before the job fails
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
    /// Pause between consecutive batches (rate-limit courtesy)
    pub inter_batch_pause: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            inter_batch_pause: Duration::from_millis(500),
        }
    }
}

/// Drives the translation engine over an ordered entry list, one batch at
/// a time, and reassembles an output list with exact count parity.
///
/// Batches run strictly sequentially so reconstruction stays index-based
/// and the engine's rate limits are respected. A batch that still fails
/// after all attempts fails the whole run; silently skipping it would
/// break parity.
pub struct TranslationBatcher {
    engine: Arc<dyn TranslationEngine>,
    config: BatcherConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl TranslationBatcher {
    pub fn new(engine: Arc<dyn TranslationEngine>, config: BatcherConfig) -> Self {
        Self {
            engine,
            config,
            cancel_rx: None,
        }
    }

    /// Set a cancellation signal, observed between batches.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Translate all entries, preserving index and timeframe, and reflow
    /// every translated text against its original.
    ///
    /// `on_progress` receives (completed batches, total batches) after each
    /// batch finishes.
    pub async fn translate_entries<F>(
        &self,
        entries: &[SubtitleEntry],
        source_lang: &str,
        target_lang: &str,
        on_progress: F,
    ) -> TranslateResult<Vec<SubtitleEntry>>
    where
        F: Fn(usize, usize),
    {
        let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        let total_batches = texts.len().div_ceil(self.config.batch_size.max(1));
        let mut translated: Vec<String> = Vec::with_capacity(texts.len());

        for (batch_idx, batch) in texts.chunks(self.config.batch_size.max(1)).enumerate() {
            if self.is_cancelled() {
                return Err(TranslateError::Cancelled);
            }
            if batch_idx > 0 && !self.config.inter_batch_pause.is_zero() {
                tokio::time::sleep(self.config.inter_batch_pause).await;
            }

            let response = self
                .call_with_retry(batch, source_lang, target_lang, batch_idx)
                .await?;
            let outcome = parse_numbered_response(&response, batch.len());
            translated.extend(align_batch(outcome, batch.len(), batch));

            on_progress(batch_idx + 1, total_batches);
        }

        // Parity is guaranteed by construction; this is the last line of
        // defense against the best-effort realignment above.
        if translated.len() != entries.len() {
            return Err(TranslateError::Parity {
                expected: entries.len(),
                actual: translated.len(),
            });
        }

        let output = entries
            .iter()
            .zip(translated)
            .map(|(entry, text)| SubtitleEntry {
                index: entry.index,
                timeframe: entry.timeframe.clone(),
                text: reflow(&entry.text, &text),
            })
            .collect();

        info!(
            entries = entries.len(),
            batches = total_batches,
            "Translation run complete"
        );
        Ok(output)
    }

    async fn call_with_retry(
        &self,
        batch: &[String],
        source_lang: &str,
        target_lang: &str,
        batch_idx: usize,
    ) -> TranslateResult<String> {
        let mut last_err = None;

        for attempt in 1..=self.config.max_attempts {
            match self
                .engine
                .translate_batch(batch, source_lang, target_lang)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        batch = batch_idx + 1,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "Translation batch attempt failed"
                    );
                    last_err = Some(e);
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        Err(TranslateError::RetriesExhausted {
            batch: batch_idx + 1,
            attempts: self.config.max_attempts,
            source: Box::new(last_err.unwrap_or(TranslateError::EmptyResponse)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Engine fed from a script of canned results, one per call.
    struct ScriptedEngine {
        script: Mutex<Vec<TranslateResult<String>>>,
        calls: Mutex<Vec<usize>>,
    }

    impl ScriptedEngine {
        fn new(script: Vec<TranslateResult<String>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslationEngine for ScriptedEngine {
        async fn translate_batch(
            &self,
            texts: &[String],
            _source_lang: &str,
            _target_lang: &str,
        ) -> TranslateResult<String> {
            self.calls.lock().unwrap().push(texts.len());
            self.script.lock().unwrap().remove(0)
        }
    }

    fn entries(n: usize) -> Vec<SubtitleEntry> {
        (1..=n as u32)
            .map(|i| SubtitleEntry {
                index: i,
                timeframe: "00:00:01,000 --> 00:00:02,000".to_string(),
                text: format!("linha {}", i),
            })
            .collect()
    }

    fn numbered(prefix: &str, n: usize) -> String {
        (1..=n)
            .map(|i| format!("{}. {} {}", i, prefix, i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn fast_config() -> BatcherConfig {
        BatcherConfig {
            retry_delay: Duration::from_millis(1),
            inter_batch_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_23_entries_with_flaky_second_batch() {
        // 3 batches of 10/10/3; batch 2 fails twice then succeeds
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(numbered("first", 10)),
            Err(TranslateError::EmptyResponse),
            Err(TranslateError::Service {
                status: 503,
                body: "overloaded".to_string(),
            }),
            Ok(numbered("second", 10)),
            Ok(numbered("third", 3)),
        ]));
        let batcher = TranslationBatcher::new(engine.clone(), fast_config());

        let seen = Mutex::new(Vec::new());
        let output = batcher
            .translate_entries(&entries(23), "Portuguese", "English", |done, total| {
                seen.lock().unwrap().push((done, total));
            })
            .await
            .unwrap();

        assert_eq!(output.len(), 23);
        assert_eq!(engine.call_sizes(), vec![10, 10, 10, 10, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);

        // Batch 2 entries came from the successful retry, not fallback
        assert_eq!(output[10].text, "second 1");
        assert_eq!(output[19].text, "second 10");
        assert_eq!(output[22].text, "third 3");
        // Index and timeframe preserved end-to-end
        assert_eq!(output[22].index, 23);
        assert_eq!(output[0].timeframe, "00:00:01,000 --> 00:00:02,000");
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_run() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Err(TranslateError::EmptyResponse),
            Err(TranslateError::EmptyResponse),
            Err(TranslateError::EmptyResponse),
        ]));
        let batcher = TranslationBatcher::new(engine, fast_config());

        let err = batcher
            .translate_entries(&entries(5), "pt", "en", |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranslateError::RetriesExhausted {
                batch: 1,
                attempts: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_count_mismatch_repaired_not_fatal() {
        // Engine returns 3 items for a batch of 5: parse succeeds partially,
        // the tail is padded with original text
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(numbered("t", 3))]));
        let batcher = TranslationBatcher::new(engine, fast_config());

        let output = batcher
            .translate_entries(&entries(5), "pt", "en", |_, _| {})
            .await
            .unwrap();
        assert_eq!(output.len(), 5);
        assert_eq!(output[0].text, "t 1");
        assert_eq!(output[3].text, "linha 4");
        assert_eq!(output[4].text, "linha 5");
    }

    #[tokio::test]
    async fn test_cancel_between_batches() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(numbered("a", 10)),
            Ok(numbered("b", 10)),
        ]));
        let (tx, rx) = watch::channel(false);
        let batcher = TranslationBatcher::new(engine, fast_config()).with_cancel(rx);

        // Cancel after the first batch reports progress
        let err = batcher
            .translate_entries(&entries(20), "pt", "en", |done, _| {
                if done == 1 {
                    let _ = tx.send(true);
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Cancelled));
    }

    #[tokio::test]
    async fn test_reflow_applied_to_output() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(
            "1. - You okay? - Yes, I am.".to_string()
        )]));
        let batcher = TranslationBatcher::new(engine, fast_config());

        let input = vec![SubtitleEntry {
            index: 1,
            timeframe: "00:00:01,000 --> 00:00:02,000".to_string(),
            text: "- Estás bem?\n- Sim, estou.".to_string(),
        }];
        let output = batcher
            .translate_entries(&input, "pt", "en", |_, _| {})
            .await
            .unwrap();
        assert_eq!(output[0].text, "- You okay?\n- Yes, I am.");
    }
}
