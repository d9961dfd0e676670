use folio_agent::documents::source_from_config;
use folio_core::config::{AppConfig, LoadOptions};
use folio_db::{connect_with_settings, migrations, ping};
use serde::Serialize;

use crate::commands::{block_on, escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code is 0 when nothing failed; warnings (missing grounding documents)
/// do not fail the run.
pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_generation_credential(&config));
            checks.push(check_database(&config));
            checks.push(check_documents(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["generation_credential", "database_readiness", "grounding_documents"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);

    let (overall_status, summary) = if failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else if warned {
        (CheckStatus::Warn, "doctor: ready, with warnings")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_generation_credential(config: &AppConfig) -> DoctorCheck {
    if config.generation.has_credential() {
        DoctorCheck {
            name: "generation_credential",
            status: CheckStatus::Pass,
            details: format!("API key configured for model `{}`", config.generation.model),
        }
    } else {
        DoctorCheck {
            name: "generation_credential",
            status: CheckStatus::Fail,
            details: "FOLIO_GENERATION_API_KEY is not set; every chat request will fail"
                .to_string(),
        }
    }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let result = block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        ping(&pool).await.map_err(|error| format!("database query failed: {error}"))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| format!("migrations could not be applied: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    })
    .and_then(|inner| inner);

    match result {
        Ok(()) => DoctorCheck {
            name: "database_readiness",
            status: CheckStatus::Pass,
            details: format!("connected and migrated using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_readiness", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_documents(config: &AppConfig) -> DoctorCheck {
    let objects = [&config.documents.resume_object, &config.documents.background_object];

    let result = block_on(async {
        let source = source_from_config(&config.documents).map_err(|error| error.to_string())?;
        let mut missing = Vec::new();
        for object in objects {
            if let Err(error) = source.fetch(object).await {
                missing.push(error.to_string());
            }
        }
        Ok::<Vec<String>, String>(missing)
    })
    .and_then(|inner| inner);

    match result {
        Ok(missing) if missing.is_empty() => DoctorCheck {
            name: "grounding_documents",
            status: CheckStatus::Pass,
            details: format!("both documents reachable at `{}`", config.documents.location),
        },
        Ok(missing) => DoctorCheck {
            name: "grounding_documents",
            status: CheckStatus::Warn,
            details: format!("answers will use fallback text: {}", missing.join("; ")),
        },
        Err(error) => {
            DoctorCheck { name: "grounding_documents", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
