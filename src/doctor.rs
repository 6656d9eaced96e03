use std::str::FromStr;

use ramble_core::AppConfig;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

/// Health-check output as a flat list of label/ok/detail rows rather than
/// an early-exit validation chain, so one bad check doesn't hide the others.
pub fn run_doctor(config: &AppConfig) {
    let checks = vec![
        check_llm_config(config),
        check_data_dir(config),
        check_database(config),
        check_schedules(config),
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {ok_count} passed, {fail_count} issues found");
}

fn check_llm_config(config: &AppConfig) -> CheckResult {
    let has_key = config.llm.api_key.as_ref().is_some_and(|k| !k.is_empty() && !k.starts_with("${"));
    let needs_key = config.llm.provider != "ollama";

    if !needs_key || has_key {
        CheckResult {
            label: "LLM config".into(),
            ok: true,
            detail: format!("{} ({})", config.llm.model_id, config.llm.provider),
        }
    } else {
        CheckResult {
            label: "LLM config".into(),
            ok: false,
            detail: format!("no api_key set for provider '{}'", config.llm.provider),
        }
    }
}

fn check_data_dir(config: &AppConfig) -> CheckResult {
    let dir = config.data_dir();
    match std::fs::create_dir_all(&dir) {
        Ok(()) => {
            let probe = dir.join(".doctor_probe");
            match std::fs::write(&probe, b"ok") {
                Ok(()) => {
                    let _ = std::fs::remove_file(&probe);
                    CheckResult { label: "Data dir".into(), ok: true, detail: format!("{}", dir.display()) }
                }
                Err(e) => CheckResult {
                    label: "Data dir".into(),
                    ok: false,
                    detail: format!("{} not writable: {e}", dir.display()),
                },
            }
        }
        Err(e) => CheckResult { label: "Data dir".into(), ok: false, detail: format!("{}: {e}", dir.display()) },
    }
}

fn check_database(config: &AppConfig) -> CheckResult {
    match ramble_store::Store::open(&config.data_dir(), "default") {
        Ok(_) => CheckResult {
            label: "Database".into(),
            ok: true,
            detail: format!("{}", config.data_dir().join("ramble.sqlite3").display()),
        },
        Err(e) => CheckResult { label: "Database".into(), ok: false, detail: format!("{e}") },
    }
}

fn check_schedules(config: &AppConfig) -> CheckResult {
    let decay_expr = ramble_kernel::interval_to_cron_expr(config.memory.decay_interval_secs);
    let observer_expr = ramble_kernel::interval_to_cron_expr(config.observer.schedule_interval_secs);
    let bad: Vec<&str> = [&decay_expr, &observer_expr]
        .into_iter()
        .filter(|expr| cron::Schedule::from_str(expr).is_err())
        .map(|s| s.as_str())
        .collect();

    if bad.is_empty() {
        CheckResult {
            label: "Schedules".into(),
            ok: true,
            detail: format!("decay={decay_expr}, observers={observer_expr}"),
        }
    } else {
        CheckResult { label: "Schedules".into(), ok: false, detail: format!("invalid: {}", bad.join(", ")) }
    }
}
