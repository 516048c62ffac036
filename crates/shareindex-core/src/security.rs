//! Security-log analysis workflow.
//!
//! Shares the workflow runner and failure semantics with ingestion, but
//! its heavy lifting is delegated to external collaborators: a reasoning
//! model with log-tool access ([`LogAnalyst`]) and an alert channel
//! ([`Notifier`]). The engine's own responsibility ends at invoking the
//! analyst, best-effort-parsing a [`SecurityAnalysis`] out of its free-form
//! reply, gating the alert on a severity threshold, and recording the scan.
//!
//! Parsing is isolated in [`parse_analysis`] with an explicit fallback
//! ([`fallback_analysis`]) so the fuzzy part is unit-testable on its own;
//! a malformed model reply degrades to a low-severity analysis rather than
//! failing the run.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::ScanRecord;
use crate::store::AuditStore;
use crate::workflow::{WorkflowRun, WorkflowRunner};

/// Analysis severity, ordered from benign to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Severity::None),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(crate::error::Error::InvalidConfig(format!(
                "unknown severity: {other}"
            ))),
        }
    }
}

/// One finding within an analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityIssue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub affected_hosts: Option<Vec<String>>,
}

/// Structured result expected from the reasoning collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub severity: Severity,
    #[serde(default)]
    pub issues: Vec<SecurityIssue>,
    pub summary: String,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    #[serde(rename = "logsAnalyzed", default)]
    pub logs_analyzed: u64,
}

/// External reasoning collaborator with log-tool access. Returns free-form
/// text expected (but not guaranteed) to contain a JSON analysis.
#[async_trait]
pub trait LogAnalyst: Send + Sync {
    async fn analyze(&self, log_directory: &str, focus: Severity) -> Result<String>;
}

/// Result of an alert attempt. A skipped alert is an outcome, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct NotifyOutcome {
    pub sent: bool,
    pub reason: Option<String>,
}

/// External notification collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_alert(
        &self,
        analysis: &SecurityAnalysis,
        recipients: &[String],
    ) -> Result<NotifyOutcome>;
}

/// Extract a [`SecurityAnalysis`] from the analyst's reply.
///
/// Tries, in order: a ```json fenced block, any ``` fenced block, the
/// outermost `{...}` span, and finally the raw text.
pub fn parse_analysis(text: &str) -> std::result::Result<SecurityAnalysis, serde_json::Error> {
    if let Some(json) = extract_fenced(text, "```json") {
        if let Ok(parsed) = serde_json::from_str(json) {
            return Ok(parsed);
        }
    }
    if let Some(json) = extract_fenced(text, "```") {
        if let Ok(parsed) = serde_json::from_str(json) {
            return Ok(parsed);
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str(&text[start..=end]) {
                return Ok(parsed);
            }
        }
    }
    serde_json::from_str(text)
}

/// Low-severity analysis used when the analyst's reply cannot be parsed.
pub fn fallback_analysis(raw: &str) -> SecurityAnalysis {
    let excerpt: String = raw.chars().take(500).collect();
    SecurityAnalysis {
        severity: Severity::Low,
        issues: Vec::new(),
        summary: format!(
            "Analysis completed but the response was not valid JSON. Raw response: {excerpt}"
        ),
        recommendations: None,
        logs_analyzed: 0,
    }
}

fn extract_fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Trigger input for one scan run.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub owner_id: String,
    /// Directory on the share holding the logs, e.g. `"logs"`.
    pub log_directory: String,
    pub recipients: Vec<String>,
    /// Alert when the analysis severity is at or above this level.
    pub threshold: Severity,
}

/// Caller-visible result of one scan run.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub severity: Severity,
    pub issues_found: usize,
    pub logs_analyzed: u64,
    pub alert_sent: bool,
    pub summary: String,
}

/// The security-analysis workflow, wired to its collaborators.
pub struct SecurityWorkflow<'a> {
    pub analyst: &'a dyn LogAnalyst,
    pub notifier: &'a dyn Notifier,
    pub audit: &'a dyn AuditStore,
    pub runner: WorkflowRunner,
}

impl SecurityWorkflow<'_> {
    /// Execute one scan run. Mirrors the ingestion workflow contract: the
    /// finished run is always returned, and a failed run also leaves a
    /// `failed` scan record behind.
    pub async fn run(&self, opts: &ScanOptions) -> (WorkflowRun, Result<ScanReport>) {
        let (run, result) = self
            .runner
            .run("security-scan", |ctx| async move {
                let analysis = ctx.step("analyze_logs", self.analyze(opts)).await?;

                let notify = ctx.step("send_alert", self.alert(opts, &analysis)).await?;

                let report = ScanReport {
                    severity: analysis.severity,
                    issues_found: analysis.issues.len(),
                    logs_analyzed: analysis.logs_analyzed,
                    alert_sent: notify.sent,
                    summary: analysis.summary.clone(),
                };
                let analysis_json =
                    serde_json::to_value(&analysis).unwrap_or(serde_json::Value::Null);
                ctx.step(
                    "record_outcome",
                    self.record(opts, analysis_json, &report, "completed", None),
                )
                .await?;

                info!(severity = analysis.severity.as_str(), issues = report.issues_found, "scan completed");
                Ok(report)
            })
            .await;

        if let Err(err) = &result {
            let report = ScanReport {
                severity: Severity::None,
                issues_found: 0,
                logs_analyzed: 0,
                alert_sent: false,
                summary: String::new(),
            };
            if let Err(audit_err) = self
                .record(
                    opts,
                    serde_json::Value::Null,
                    &report,
                    "failed",
                    Some(format!("{}: {}", err.kind(), err)),
                )
                .await
            {
                warn!(error = %audit_err, "failed to persist failed-scan record");
            }
        }

        (run, result)
    }

    /// Step 1: invoke the analyst and best-effort-parse its reply.
    async fn analyze(&self, opts: &ScanOptions) -> Result<SecurityAnalysis> {
        let reply = self
            .analyst
            .analyze(&opts.log_directory, opts.threshold)
            .await?;
        Ok(parse_analysis(&reply).unwrap_or_else(|err| {
            warn!(error = %err, "analyst reply was not valid JSON, using fallback");
            fallback_analysis(&reply)
        }))
    }

    /// Step 2: alert only above the threshold and only with recipients.
    async fn alert(&self, opts: &ScanOptions, analysis: &SecurityAnalysis) -> Result<NotifyOutcome> {
        if analysis.severity < opts.threshold {
            return Ok(NotifyOutcome {
                sent: false,
                reason: Some(format!(
                    "severity {} below threshold {}",
                    analysis.severity.as_str(),
                    opts.threshold.as_str()
                )),
            });
        }
        if opts.recipients.is_empty() {
            return Ok(NotifyOutcome {
                sent: false,
                reason: Some("no recipients configured".to_string()),
            });
        }
        self.notifier.send_alert(analysis, &opts.recipients).await
    }

    /// Step 3: persist the scan row.
    async fn record(
        &self,
        opts: &ScanOptions,
        analysis: serde_json::Value,
        report: &ScanReport,
        status: &str,
        error: Option<String>,
    ) -> Result<()> {
        self.audit
            .record_scan(&ScanRecord {
                id: Uuid::new_v4().to_string(),
                owner_id: opts.owner_id.clone(),
                source: opts.log_directory.clone(),
                severity: report.severity.as_str().to_string(),
                issues_found: report.issues_found,
                logs_analyzed: report.logs_analyzed,
                analysis,
                alert_sent: report.alert_sent,
                status: status.to_string(),
                error,
                completed_at: Utc::now(),
            })
            .await
    }
}
