/// TNS bulk report submission tool
use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tns_report::clients::{ClientOptions, HttpTransport, TnsClient};
use tns_report::config::{AppConfig, ReplyPolicy};
use tns_report::domain::{
    Candidate, CandidateOutcome, PollOutcome, SearchOutcome, SubmissionOutcome,
};
use tns_report::logging::{init_logging, Logger, TracingLogger};
use tns_report::report::ReportBuilder;
use tns_report::services::BulkReportService;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Send AT reports to the Transient Name Server", long_about = None)]
struct Cli {
    /// TNS bot API key
    api_key: String,

    /// JSON file holding a bulk report, or a candidate light curve with --candidate
    report_file: PathBuf,

    /// Submit to the production TNS instead of the sandbox
    #[arg(long)]
    production: bool,

    /// Treat the file as a candidate light curve and build the AT report from it
    #[arg(long)]
    candidate: bool,

    /// Search TNS around the candidate position and skip it if already reported
    #[arg(long, requires = "candidate")]
    check_existing: bool,

    /// Number of reply requests before giving up
    #[arg(long, value_name = "N")]
    attempts: Option<u32>,

    /// Seconds to wait before each reply request
    #[arg(long, value_name = "SECONDS")]
    delay: Option<u64>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = AppConfig::from_env()?;
    if cli.production {
        config.sandbox = false;
    }
    let defaults = config.reply_policy;
    config.reply_policy = ReplyPolicy::new(
        cli.attempts.unwrap_or(defaults.max_attempts),
        cli.delay.map(Duration::from_secs).unwrap_or(defaults.delay),
    );
    info!("Configuration loaded, submitting to {}", config.base_url());

    let contents = std::fs::read_to_string(&cli.report_file)
        .with_context(|| format!("Failed to read {}", cli.report_file.display()))?;

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let transport = Arc::new(HttpTransport::new()?);
    let client = TnsClient::with_base_url(
        config.base_url(),
        ClientOptions::new(&cli.api_key, config.timeout),
        transport,
        logger.clone(),
    );
    let service = BulkReportService::new(client, logger);

    let code = if cli.candidate {
        let candidate: Candidate = serde_json::from_str(&contents).with_context(|| {
            format!(
                "{} is not a candidate light curve",
                cli.report_file.display()
            )
        })?;
        let radius = cli.check_existing.then_some(config.search_radius_arcsec);
        run_candidate(&service, &config, &candidate, radius).await
    } else {
        let report: Value = serde_json::from_str(&contents)
            .with_context(|| format!("{} is not valid JSON", cli.report_file.display()))?;
        run_bulk_report(&service, &config, &report).await
    };

    process::exit(code);
}

/// Submit a ready-made bulk report and wait for its feedback
async fn run_bulk_report(service: &BulkReportService, config: &AppConfig, report: &Value) -> i32 {
    tracing::debug!(
        "bulk report:\n{}",
        serde_json::to_string_pretty(report).unwrap_or_default()
    );

    let submission = service.submit(report).await;
    let Some(report_id) = submission.report_id().cloned() else {
        error!("Submission failed: {:?}", submission);
        return submission_exit_code(&submission);
    };
    info!("REPORT ID = {}", report_id);

    let poll = service.poll_reply(&report_id, &config.reply_policy).await;
    print_feedback(&poll);
    info!("Done");
    0
}

/// Build the AT report for a candidate, then submit and poll it
async fn run_candidate(
    service: &BulkReportService,
    config: &AppConfig,
    candidate: &Candidate,
    search_radius_arcsec: Option<f64>,
) -> i32 {
    let builder = ReportBuilder::new(config.reporter.clone());
    let outcome = match service
        .report_candidate(
            &builder,
            candidate,
            &config.reply_policy,
            search_radius_arcsec,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Cannot build report for {}: {}", candidate.internal_name, e);
            return 1;
        }
    };

    let code = candidate_exit_code(&outcome);
    match outcome {
        CandidateOutcome::Submitted { report_id, poll } => {
            info!("TNS report ID {}", report_id);
            print_feedback(&poll);
        }
        CandidateOutcome::Skipped(found) if code == 0 => {
            info!("{} not submitted: {:?}", candidate.internal_name, found);
        }
        CandidateOutcome::Skipped(found) => {
            error!(
                "{} not submitted, TNS search failed: {:?}",
                candidate.internal_name, found
            );
        }
        CandidateOutcome::NotSubmitted(submission) => {
            error!("Send failure for {}: {:?}", candidate.internal_name, submission);
        }
    }
    code
}

/// 0 once TNS handed back a report id, 1 otherwise
fn submission_exit_code(submission: &SubmissionOutcome) -> i32 {
    match submission {
        SubmissionOutcome::Accepted(_) => 0,
        _ => 1,
    }
}

/// A skip is only a success when the search gave a clear answer
fn candidate_exit_code(outcome: &CandidateOutcome) -> i32 {
    match outcome {
        CandidateOutcome::Submitted { .. } => 0,
        CandidateOutcome::Skipped(SearchOutcome::NotReported | SearchOutcome::Reported(_)) => 0,
        CandidateOutcome::Skipped(SearchOutcome::Failed(_) | SearchOutcome::Ambiguous(_)) => 1,
        CandidateOutcome::NotSubmitted(_) => 1,
    }
}

fn print_feedback(poll: &PollOutcome) {
    match poll.feedback() {
        Some(feedback) => println!(
            "{}",
            serde_json::to_string_pretty(feedback).unwrap_or_else(|_| feedback.to_string())
        ),
        None => info!(
            "No feedback after {} attempts, last reply: {:?}",
            poll.attempts, poll.last
        ),
    }
}
