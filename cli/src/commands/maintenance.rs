use anyhow::{Result, bail};

use fitlog_core::service::{FitlogService, Ledger};

use super::helpers::prompt_confirm;

pub(crate) fn cmd_reconcile(service: &FitlogService, user_id: &str, json: bool) -> Result<()> {
    let summary = service.reconcile(user_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if summary.logs_repaired == 0 {
        println!("Checked {} day(s), all totals consistent", summary.logs_checked);
    } else {
        println!(
            "Checked {} day(s), repaired {}",
            summary.logs_checked, summary.logs_repaired
        );
    }

    Ok(())
}

/// Delete every log of `user_id`. Without `yes` the user is asked first; in
/// JSON mode there is nobody to ask, so `--yes` is required.
pub(crate) fn cmd_reset(
    service: &FitlogService,
    user_id: &str,
    yes: bool,
    json: bool,
) -> Result<()> {
    if !yes {
        if json {
            bail!("Refusing to reset without --yes");
        }
        if !prompt_confirm(&format!("Delete all logs for user '{user_id}'?"))? {
            println!("Cancelled");
            return Ok(());
        }
    }

    let removed = service.reset_user_data(user_id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "user_id": user_id, "logs_deleted": removed })
        );
    } else {
        println!("Deleted {removed} day(s) of logs for '{user_id}'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fitlog_core::models::NewWorkoutEntry;

    #[test]
    fn test_reset_json_needs_yes() {
        let svc = FitlogService::new_in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        svc.add_workout_entry("u1", date, &NewWorkoutEntry::new("Squat", 5, 5, 100.0))
            .unwrap();

        assert!(cmd_reset(&svc, "u1", false, true).is_err());
        assert_eq!(svc.load_daily_logs("u1").unwrap().len(), 1);

        cmd_reset(&svc, "u1", true, true).unwrap();
        assert!(svc.load_daily_logs("u1").unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_clean_store() {
        let svc = FitlogService::new_in_memory().unwrap();
        cmd_reconcile(&svc, "u1", true).unwrap();
    }
}
