use crate::{
    functions::{BookingStore, FunctionDispatcher, VenueStore},
    schemas::{multiwoz, SchemaRegistry, SgdCatalog},
    services::{
        prompts::{multiwoz_system_prompt, sgd_system_prompt},
        ChatModel, OpenAIClient,
    },
    types::goal::{
        find_multiwoz_goal, find_sgd_goal, load_multiwoz, load_sgd_dialogues, DialogueGoal,
    },
    DialogueConfig, DialogueDriver, FunctionAgent, SimulatedUser,
};
use anyhow::{anyhow, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};

const DEFAULT_MODEL: &str = "gpt-3.5-turbo-0613";

fn common_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("dialog-id")
                .short('i')
                .long("dialog-id")
                .value_name("ID")
                .help("Dialogue to simulate")
                .required(true),
        )
        .arg(
            Arg::new("agent-model")
                .long("agent-model")
                .value_name("MODEL")
                .help("Model playing the assistant")
                .default_value(DEFAULT_MODEL),
        )
        .arg(
            Arg::new("user-model")
                .long("user-model")
                .value_name("MODEL")
                .help("Model playing the user")
                .default_value(DEFAULT_MODEL),
        )
        .arg(
            Arg::new("max-turns")
                .long("max-turns")
                .value_name("COUNT")
                .help("Maximum number of dialogue turns")
                .default_value("15"),
        )
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .help("API key (or set OPENAI_API_KEY env var)"),
        )
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .value_name("URL")
                .help("API base URL (or set OPENAI_BASE_URL / OPENROUTER_BASE_URL env vars)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Request timeout in seconds")
                .default_value("60"),
        )
}

fn command() -> Command {
    Command::new("tod-bench")
        .version("0.1.0")
        .about("Simulate a task-oriented dialogue between an LLM user and a function-calling LLM assistant")
        .subcommand_required(true)
        .subcommand(common_args(
            Command::new("multiwoz")
                .about("Run a dialogue of the restaurant/hotel/attraction/train/taxi family")
                .arg(
                    Arg::new("data")
                        .long("data")
                        .value_name("FILE")
                        .help("MultiWOZ data.json")
                        .default_value("MultiWOZ_2.1/data.json"),
                )
                .arg(
                    Arg::new("venue-db")
                        .long("venue-db")
                        .value_name("FILE")
                        .help("SQLite database of venues and trains")
                        .default_value("multiwoz/database/multiwoz.db"),
                )
                .arg(
                    Arg::new("booking-db")
                        .long("booking-db")
                        .value_name("FILE")
                        .help("SQLite database receiving bookings")
                        .default_value("multiwoz/database/booking.db"),
                ),
        ))
        .subcommand(common_args(
            Command::new("sgd")
                .about("Run a dialogue of the multi-service family")
                .arg(
                    Arg::new("schema")
                        .long("schema")
                        .value_name("FILE")
                        .help("Service schema file, repeatable")
                        .action(ArgAction::Append)
                        .required(true),
                )
                .arg(
                    Arg::new("dialogues")
                        .long("dialogues")
                        .value_name("FILE")
                        .help("Dialogue file, repeatable")
                        .action(ArgAction::Append)
                        .required(true),
                )
                .arg(
                    Arg::new("info-db")
                        .long("info-db")
                        .value_name("FILE")
                        .help("SQLite database of service records")
                        .default_value("sgd/db/sgd.db"),
                )
                .arg(
                    Arg::new("trans-db")
                        .long("trans-db")
                        .value_name("FILE")
                        .help("SQLite database receiving transactions")
                        .default_value("sgd/db/transaction.db"),
                ),
        ))
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| anyhow!("missing --{}", name))
}

fn paths(matches: &ArgMatches, name: &str) -> Vec<PathBuf> {
    matches
        .get_many::<String>(name)
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default()
}

fn build_client(matches: &ArgMatches) -> anyhow::Result<OpenAIClient> {
    let api_key = matches
        .get_one::<String>("api-key")
        .cloned()
        .or_else(|| env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| {
            anyhow!("API key is required. Set OPENAI_API_KEY environment variable or use --api-key")
        })?;
    let timeout_seconds: u64 = required(matches, "timeout")?
        .parse()
        .context("--timeout must be a number of seconds")?;

    let mut client = OpenAIClient::new(api_key).with_timeout(Duration::from_secs(timeout_seconds));
    if let Some(base_url) = matches
        .get_one::<String>("base-url")
        .cloned()
        .or_else(|| env::var("OPENAI_BASE_URL").ok())
        .or_else(|| env::var("OPENROUTER_BASE_URL").ok())
    {
        client.set_base_url(base_url);
    }
    info!("Base URL: {}", client.base_url());
    Ok(client)
}

struct Setup {
    goal: DialogueGoal,
    registry: SchemaRegistry,
    dispatcher: Arc<FunctionDispatcher>,
    system_prompt: String,
}

fn setup_multiwoz(matches: &ArgMatches) -> anyhow::Result<Setup> {
    let venues = Arc::new(
        VenueStore::open(required(matches, "venue-db")?).context("opening venue database")?,
    );
    let bookings = Arc::new(
        BookingStore::open(required(matches, "booking-db")?).context("opening booking database")?,
    );
    let dialogues = load_multiwoz(required(matches, "data")?).context("loading dialogues")?;
    let goal = find_multiwoz_goal(&dialogues, required(matches, "dialog-id")?)?;

    let registry = multiwoz::build_registry(&venues)?.subset(&goal.services)?;
    let dispatcher = Arc::new(FunctionDispatcher::new(&registry, venues, bookings));
    let system_prompt = multiwoz_system_prompt(&goal.services);
    Ok(Setup {
        goal,
        registry,
        dispatcher,
        system_prompt,
    })
}

fn setup_sgd(matches: &ArgMatches) -> anyhow::Result<Setup> {
    let catalog = SgdCatalog::load(&paths(matches, "schema")).context("loading schemas")?;
    let venues = Arc::new(
        VenueStore::open(required(matches, "info-db")?).context("opening service database")?,
    );
    let bookings = Arc::new(
        BookingStore::open(required(matches, "trans-db")?)
            .context("opening transaction database")?,
    );
    let dialogues = load_sgd_dialogues(&paths(matches, "dialogues")).context("loading dialogues")?;
    let goal = find_sgd_goal(&dialogues, required(matches, "dialog-id")?, &catalog)?;

    let registry = catalog.build_registry(&venues)?.subset(&goal.services)?;
    let dispatcher = Arc::new(FunctionDispatcher::new(&registry, venues, bookings));
    let system_prompt = sgd_system_prompt(&catalog, &goal.services)?;
    Ok(Setup {
        goal,
        registry,
        dispatcher,
        system_prompt,
    })
}

/// CLI entry point for the tod-bench tool
pub async fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let matches = command().get_matches();
    let (family, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("a dataset subcommand is required"))?;

    let setup = match family {
        "multiwoz" => setup_multiwoz(sub_matches)?,
        "sgd" => setup_sgd(sub_matches)?,
        other => return Err(anyhow!("unknown dataset family {}", other)),
    };
    let max_turns: usize = required(sub_matches, "max-turns")?
        .parse()
        .context("--max-turns must be a number")?;
    let agent_model = required(sub_matches, "agent-model")?;
    let user_model = required(sub_matches, "user-model")?;

    info!("Dialogue: {}", setup.goal.id);
    info!("Services: {}", setup.goal.services.join(", "));
    info!("User goals:\n{}", setup.goal.goal_text);

    let client: Arc<dyn ChatModel> = Arc::new(build_client(sub_matches)?);
    let agent = FunctionAgent::new(
        client.clone(),
        setup.registry,
        setup.dispatcher,
        setup.system_prompt,
    )
    .with_model_name(agent_model.as_str());
    let user = SimulatedUser::new(client, setup.goal).with_model_name(user_model.as_str());

    let driver = DialogueDriver::new(user, agent)
        .with_config(DialogueConfig::default().with_max_turns(max_turns));

    match driver.run().await {
        Ok(transcript) => {
            info!("Dialogue finished:\n{}", transcript.replay());
            println!("{}", serde_json::to_string_pretty(&transcript)?);
        }
        Err(e) => {
            error!("Dialogue run failed: {}", e);
            println!("{}", serde_json::to_string_pretty(&e.to_error_payload())?);
            return Err(e.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn test_sgd_repeatable_paths() {
        let matches = command()
            .try_get_matches_from([
                "tod-bench",
                "sgd",
                "--schema",
                "a.json",
                "--schema",
                "b.json",
                "--dialogues",
                "dialogues_001.json",
                "--dialog-id",
                "1_00000",
            ])
            .unwrap();
        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "sgd");
        assert_eq!(
            paths(sub_matches, "schema"),
            vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
        assert_eq!(required(sub_matches, "max-turns").unwrap(), "15");
    }
}
