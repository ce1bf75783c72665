mod commands;
mod config;
mod gemini;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_analyze, cmd_burned, cmd_diet, cmd_food_add, cmd_food_rm, cmd_plans, cmd_reconcile,
    cmd_reset, cmd_summary, cmd_trends, cmd_weight, cmd_workout_add, cmd_workout_rm,
};
use crate::config::{Config, GeminiConfig};
use crate::gemini::{FoodRecognizer, GeminiClient};
use fitlog_core::service::FitlogService;
use fitlog_core::session::Session;

#[derive(Parser)]
#[command(
    name = "fitlog",
    version,
    about = "Track diet, workouts and body weight",
    long_about = "Track diet, workouts and body weight.\n\n\
        Each day carries a diet plan (High, Med or Low carb), food and workout \
        entries, and optional weight and calories burned."
)]
struct Cli {
    /// User whose logs to work with
    #[arg(long, global = true, env = "FITLOG_USER", default_value = "local")]
    user: String,
    /// Database file (default: fitlog.db in the data directory)
    #[arg(long, global = true, env = "FITLOG_DB", value_name = "PATH")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Day(DayCommands),
    /// List the diet plans and their macro targets
    Plans {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute stored daily totals from their entries
    Reconcile {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all logs of the current user
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

/// Commands that run against a loaded session.
#[derive(Subcommand)]
enum DayCommands {
    /// Log or remove food entries
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log or remove workout entries
    Workout {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// Set the diet plan for a day: High, Med or Low
    Diet {
        /// Diet type
        diet: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record body weight for a day
    Weight {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record calories burned for a day
    Burned {
        /// Calories burned (kcal)
        kcal: f64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day against its diet plan (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight, volume and calorie trends over the last N logged days
    Trends {
        /// Number of logged days to show
        #[arg(short, long, default_value = "7")]
        days: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Estimate nutrition from a description and/or photos
    Analyze {
        /// Text description of the food
        #[arg(short, long)]
        text: Option<String>,
        /// Photo of the food (jpg, png, webp, heic); repeatable
        #[arg(short, long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
        /// Offer to log each recognized item
        #[arg(long)]
        log: bool,
        /// Log every recognized item without asking (with --log)
        #[arg(short, long)]
        yes: bool,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Log a food entry; calories default to 4/4/9 kcal per gram of macros
    Add {
        /// Food name
        name: String,
        /// Carbs (g)
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Protein (g)
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Fat (g)
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Calories (kcal), overriding the macro-derived value
        #[arg(long)]
        calories: Option<f64>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a food entry by ID (or unique ID prefix)
    Rm {
        /// Entry ID
        id: String,
        /// Date of the entry (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WorkoutCommands {
    /// Log a workout entry; volume is weight x sets x reps
    Add {
        /// Exercise name
        exercise: String,
        /// Number of sets
        #[arg(short, long)]
        sets: i64,
        /// Reps per set
        #[arg(short, long)]
        reps: i64,
        /// Load, e.g. "60", "27.5kg" or "Bodyweight"
        #[arg(short, long, default_value = "0")]
        weight: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a workout entry by ID (or unique ID prefix)
    Rm {
        /// Entry ID
        id: String,
        /// Date of the entry (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fitlog=info,fitlog_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn recognizer() -> Result<Option<Arc<dyn FoodRecognizer>>> {
    let client = GeminiClient::from_config(&GeminiConfig::from_env())?;
    Ok(client.map(|c| Arc::new(c) as Arc<dyn FoodRecognizer>))
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let service = FitlogService::new(&config.db_path)?;
    let user = cli.user;

    let command = match cli.command {
        Commands::Day(command) => command,
        Commands::Plans { json } => return cmd_plans(json),
        Commands::Reconcile { json } => return cmd_reconcile(&service, &user, json),
        Commands::Reset { yes, json } => return cmd_reset(&service, &user, yes, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            return server::start_server(service, recognizer()?, port, &bind, api_key).await;
        }
    };

    let mut session = Session::open(&service, user)?;
    let result = match command {
        DayCommands::Food { command } => match command {
            FoodCommands::Add {
                name,
                carbs,
                protein,
                fat,
                calories,
                date,
                json,
            } => cmd_food_add(
                &mut session,
                &name,
                carbs,
                protein,
                fat,
                calories,
                date,
                json,
            ),
            FoodCommands::Rm { id, date, json } => cmd_food_rm(&mut session, &id, date, json),
        },
        DayCommands::Workout { command } => match command {
            WorkoutCommands::Add {
                exercise,
                sets,
                reps,
                weight,
                date,
                json,
            } => cmd_workout_add(&mut session, &exercise, sets, reps, &weight, date, json),
            WorkoutCommands::Rm { id, date, json } => {
                cmd_workout_rm(&mut session, &id, date, json)
            }
        },
        DayCommands::Diet { diet, date, json } => cmd_diet(&mut session, &diet, date, json),
        DayCommands::Weight {
            value,
            unit,
            date,
            json,
        } => cmd_weight(&mut session, value, &unit, date, json),
        DayCommands::Burned { kcal, date, json } => cmd_burned(&mut session, kcal, date, json),
        DayCommands::Summary { date, json } => cmd_summary(&session, date, json),
        DayCommands::Trends { days, json } => cmd_trends(&session, days, json),
        DayCommands::Analyze {
            text,
            images,
            log,
            yes,
            date,
            json,
        } => {
            let recognizer = recognizer()?;
            cmd_analyze(
                &mut session,
                recognizer.as_deref(),
                text,
                images,
                log,
                yes,
                date,
                json,
            )
            .await
        }
    };
    session.close();
    result
}
