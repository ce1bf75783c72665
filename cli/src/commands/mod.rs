mod analyze;
mod food;
mod helpers;
mod log;
mod maintenance;
mod summary;
mod workout;

use fitlog_core::service::FitlogService;
use fitlog_core::session::Session;

/// Every session command works against the on-disk service.
pub(crate) type AppSession<'a> = Session<'a, FitlogService>;

pub(crate) use analyze::cmd_analyze;
pub(crate) use food::{cmd_food_add, cmd_food_rm};
pub(crate) use log::{cmd_burned, cmd_diet, cmd_weight};
pub(crate) use maintenance::{cmd_reconcile, cmd_reset};
pub(crate) use summary::{cmd_plans, cmd_summary, cmd_trends};
pub(crate) use workout::{cmd_workout_add, cmd_workout_rm};
