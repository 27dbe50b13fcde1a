//! Batch processing of decrypted link lists.
//!
//! Links are resolved one after another so the output order always matches
//! the input order; the codec re-joins them positionally.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::{ProcessedLink, ProcessingResult, ProcessingStats};
use crate::resolver::{LinkResolver, ResolveError};

/// What to do when a single link fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Keep the original link and move on.
    #[default]
    Continue,
    /// Abort the batch and propagate the failure.
    StopOnError,
}

impl ErrorPolicy {
    /// Maps the `error on API error` switch to a policy.
    pub fn from_flag(error_on_api_error: bool) -> Self {
        if error_on_api_error {
            ErrorPolicy::StopOnError
        } else {
            ErrorPolicy::Continue
        }
    }
}

/// Batch processing errors.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The decrypted text held no usable line.
    #[error("No links to process")]
    NoLinks,

    /// A link failed under [`ErrorPolicy::StopOnError`].
    #[error("failed to resolve {link}: {source}")]
    Resolve {
        link: String,
        #[source]
        source: ResolveError,
    },
}

/// Runs a link list through a [`LinkResolver`].
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    resolver: LinkResolver,
    policy: ErrorPolicy,
}

impl BatchProcessor {
    /// Creates a processor with the default continue policy.
    pub fn new(resolver: LinkResolver) -> Self {
        Self {
            resolver,
            policy: ErrorPolicy::default(),
        }
    }

    /// Sets the failure policy.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the failure policy.
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Returns the resolver.
    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    /// Resolves every non-blank line of `text` with the backend named
    /// `service`.
    pub async fn process(
        &self,
        text: &str,
        service: &str,
    ) -> Result<ProcessingResult, BatchError> {
        let started = Instant::now();

        let lines: Vec<&str> = text.split('\n').collect();
        let valid: Vec<&str> = lines
            .iter()
            .map(|line| trim_invisible(line))
            .filter(|line| !line.is_empty())
            .collect();
        let total_links = lines.len();
        let skipped_links = total_links - valid.len();

        if valid.is_empty() {
            error!(total_links, "No links to process");
            return Err(BatchError::NoLinks);
        }

        let backend = self.resolver.backend(service);
        info!(
            total_links,
            valid_links = valid.len(),
            skipped_links,
            debrid_service = backend.name(),
            "Starting link processing"
        );

        let mut results = Vec::with_capacity(valid.len());
        let mut success_count = 0;
        let mut failure_count = 0;

        for link in &valid {
            match self.resolver.resolve_with(backend.as_ref(), link).await {
                Ok(resolved) => {
                    debug!(original = %link, processed = %resolved.download, "Resolved link");
                    success_count += 1;
                    results.push(ProcessedLink::resolved(
                        *link,
                        resolved.download,
                        resolved.filename,
                        resolved.filesize,
                    ));
                }
                Err(e) => {
                    failure_count += 1;
                    match self.policy {
                        ErrorPolicy::StopOnError => {
                            error!(
                                error = %e,
                                link = %link,
                                success_count,
                                failure_count,
                                remaining = valid.len() - success_count - failure_count,
                                "Error processing link, stopping batch"
                            );
                            return Err(BatchError::Resolve {
                                link: link.to_string(),
                                source: e,
                            });
                        }
                        ErrorPolicy::Continue => {
                            warn!(
                                error = %e,
                                link = %link,
                                "Error processing link, using original link"
                            );
                            results.push(ProcessedLink::failed(*link, e.to_string()));
                        }
                    }
                }
            }
        }

        let valid_links = valid.len();
        let success_rate = if valid_links > 0 {
            success_count as f64 / valid_links as f64 * 100.0
        } else {
            0.0
        };

        let stats = ProcessingStats {
            processed_at: Utc::now(),
            debrid_service: backend.name().to_string(),
            total_links,
            valid_links,
            skipped_links,
            success_count,
            failure_count,
            success_rate,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            success_count,
            failure_count,
            success_rate = %format!("{:.1}%", success_rate),
            processing_time_ms = stats.processing_time_ms,
            "Completed link processing"
        );

        Ok(ProcessingResult { results, stats })
    }
}

/// Trims whitespace, control characters and zero-width marks.
fn trim_invisible(line: &str) -> &str {
    line.trim_matches(|c: char| {
        c.is_whitespace()
            || c.is_control()
            || matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DebridBackend, ResolvedLink};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Resolves every link except those containing "bad", counting calls.
    struct Scripted {
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DebridBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn unrestrict(&self, link: &str) -> Result<ResolvedLink, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if link.contains("bad") {
                return Err(ResolveError::Api {
                    service: "Scripted".into(),
                    message: "hoster_unsupported".into(),
                    code: Some(16),
                });
            }
            Ok(ResolvedLink {
                download: link.replace("http://a/", "https://dl/"),
                filename: Some(link.rsplit('/').next().unwrap_or_default().to_string()),
                filesize: Some(42),
            })
        }
    }

    fn processor(backend: Arc<Scripted>, policy: ErrorPolicy) -> BatchProcessor {
        BatchProcessor::new(LinkResolver::new(backend)).with_policy(policy)
    }

    #[tokio::test]
    async fn stats_hold_invariants() {
        let backend = Scripted::new();
        let batch = processor(backend, ErrorPolicy::Continue);

        let result = batch
            .process("http://a/1\n\nhttp://a/bad\n \nhttp://a/3\n", "scripted")
            .await
            .unwrap();
        let stats = &result.stats;

        assert_eq!(stats.total_links, 6);
        assert_eq!(stats.valid_links, 3);
        assert_eq!(stats.skipped_links, 3);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.success_count + stats.failure_count, stats.valid_links);
        assert_eq!(stats.valid_links + stats.skipped_links, stats.total_links);
        assert!((stats.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.debrid_service, "scripted");
    }

    #[tokio::test]
    async fn output_order_matches_input() {
        let backend = Scripted::new();
        let batch = processor(backend, ErrorPolicy::Continue);

        let result = batch
            .process("http://a/A\nhttp://a/bad-B\nhttp://a/C", "scripted")
            .await
            .unwrap();

        let processed: Vec<&str> = result.results.iter().map(|r| r.processed.as_str()).collect();
        assert_eq!(
            processed,
            vec!["https://dl/A", "http://a/bad-B", "https://dl/C"]
        );
        assert!(result.results[0].success);
        assert!(!result.results[1].success);
        assert!(result.results[2].success);
    }

    #[tokio::test]
    async fn continue_policy_records_failure() {
        let backend = Scripted::new();
        let batch = processor(backend.clone(), ErrorPolicy::Continue);

        let result = batch
            .process("http://a/1\nhttp://a/bad\nhttp://a/3\nhttp://a/4", "scripted")
            .await
            .unwrap();

        assert_eq!(result.results.len(), result.stats.valid_links);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);

        let failed = &result.results[1];
        assert_eq!(failed.original, "http://a/bad");
        assert_eq!(failed.processed, "http://a/bad");
        assert_eq!(
            failed.error.as_deref(),
            Some("Scripted API error: hoster_unsupported (16)")
        );
        assert!(failed.filename.is_none());
    }

    #[tokio::test]
    async fn stop_on_error_aborts_at_failing_link() {
        let backend = Scripted::new();
        let batch = processor(backend.clone(), ErrorPolicy::StopOnError);

        let err = batch
            .process("http://a/1\nhttp://a/bad\nhttp://a/3\nhttp://a/4", "scripted")
            .await
            .unwrap_err();

        assert!(matches!(err, BatchError::Resolve { ref link, .. } if link == "http://a/bad"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_input_is_an_error() {
        let backend = Scripted::new();
        let batch = processor(backend.clone(), ErrorPolicy::Continue);

        assert!(matches!(batch.process("", "scripted").await, Err(BatchError::NoLinks)));
        assert!(matches!(batch.process("\n\n", "scripted").await, Err(BatchError::NoLinks)));
        assert!(matches!(
            batch.process(" \u{feff}\n\t\u{0}", "scripted").await,
            Err(BatchError::NoLinks)
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lines_are_trimmed_before_resolution() {
        let backend = Scripted::new();
        let batch = processor(backend, ErrorPolicy::Continue);

        let result = batch.process("  http://a/1\r", "scripted").await.unwrap();
        assert_eq!(result.results[0].original, "http://a/1");
        assert_eq!(result.results[0].filesize, Some(42));
        assert_eq!(result.results[0].filename.as_deref(), Some("1"));
    }

    #[test]
    fn policy_from_flag() {
        assert_eq!(ErrorPolicy::from_flag(true), ErrorPolicy::StopOnError);
        assert_eq!(ErrorPolicy::from_flag(false), ErrorPolicy::Continue);
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Continue);
    }
}
