//! VoteCtl - Command line client for a WolfVote election
//!
//! Usage:
//!   votectl status                          - Show election summary
//!   votectl --as admin add-voter 0xabc      - Whitelist a voter
//!   votectl --as admin start-proposals      - Open proposal registration
//!   votectl --as 0xabc propose "Lunch at 1" - Submit a proposal
//!   votectl --as 0xabc vote 0               - Cast a ballot
//!   votectl winner                          - Show the tallied winner

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;

/// WolfVote Election Control Tool
#[derive(Parser)]
#[command(name = "votectl")]
#[command(about = "Drive and inspect a WolfVote election", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wolfvote.toml")]
    config: PathBuf,

    /// API endpoint to connect to (overrides config)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Identity to act as for commands
    #[arg(long = "as", global = true)]
    caller: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show election summary
    Status,
    /// Show the current phase
    Phase,
    /// Show a voter record
    Voter { address: String },
    /// List all proposals
    Proposals,
    /// Show one proposal
    Proposal { id: u64 },
    /// Show the winning proposal (after tally)
    Winner,
    /// Show standings
    Results,
    /// Show notification history
    Events {
        /// Only events after this sequence number
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
    /// Register a voter (admin)
    AddVoter { address: String },
    /// Submit a proposal (registered voter)
    Propose { description: String },
    /// Cast a ballot (registered voter)
    Vote { proposal_id: u64 },
    /// Open proposal registration (admin)
    StartProposals,
    /// Close proposal registration (admin)
    EndProposals,
    /// Open the voting session (admin)
    StartVoting,
    /// Close the voting session (admin)
    EndVoting,
    /// Tally votes (admin)
    Tally,
}

// ============ API Response Types ============

#[derive(Debug, Deserialize)]
struct StatusResponse {
    name: String,
    admin: String,
    phase: String,
    voter_count: usize,
    proposal_count: usize,
    votes_cast: u64,
    winning_proposal_id: Option<u64>,
    last_event: u64,
    #[serde(default)]
    uptime_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct PhaseResponse {
    phase: String,
    index: u8,
}

#[derive(Debug, Deserialize)]
struct VoterResponse {
    address: String,
    is_registered: bool,
    has_voted: bool,
    voted_proposal_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Standing {
    proposal_id: u64,
    description: String,
    vote_count: u64,
}

#[derive(Debug, Deserialize)]
struct WinnerResponse {
    phase: String,
    winning_proposal_id: Option<u64>,
    proposal: Option<Standing>,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    standings: Vec<Standing>,
    winning_proposal_id: Option<u64>,
    votes_cast: u64,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    sequence: u64,
    emitted_at: String,
    event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    record: EventRecord,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

// ============ Config ============

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default)]
    api: ApiConfig,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfig {
    #[serde(default = "default_api_bind")]
    bind_address: String,
}

fn default_api_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Resolve the API endpoint from the flag or the config file
fn resolve_endpoint(cli: &Cli) -> String {
    if let Some(e) = &cli.endpoint {
        return e.trim_end_matches('/').to_string();
    }

    let bind = std::fs::read_to_string(&cli.config)
        .ok()
        .and_then(|content| toml::from_str::<Config>(&content).ok())
        .map(|config| config.api.bind_address)
        .unwrap_or_else(default_api_bind);

    // Convert bind address to localhost if it's 0.0.0.0
    if let Some(port) = bind.strip_prefix("0.0.0.0:") {
        format!("http://127.0.0.1:{}", port)
    } else {
        format!("http://{}", bind)
    }
}

// ============ HTTP ============

const CALLER_HEADER: &str = "x-wolfvote-caller";

struct Api {
    endpoint: String,
    caller: Option<String>,
    client: reqwest::Client,
}

impl Api {
    /// Build a request URL, percent-encoding each path segment
    fn url(&self, segments: &[&str]) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.endpoint)
            .with_context(|| format!("invalid endpoint {}", self.endpoint))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("endpoint {} cannot take a path", self.endpoint))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> anyhow::Result<T> {
        self.fetch(self.url(segments)?).await
    }

    async fn fetch<T: DeserializeOwned>(&self, url: reqwest::Url) -> anyhow::Result<T> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: Option<serde_json::Value>,
    ) -> anyhow::Result<T> {
        let Some(caller) = &self.caller else {
            bail!("this command needs an identity, pass --as <address>");
        };

        let url = self.url(segments)?;
        let mut request = self.client.post(url.clone()).header(CALLER_HEADER, caller);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.context("invalid response body");
    }

    match response.json::<ErrorResponse>().await {
        Ok(err) => bail!("{} ({})", err.error, err.code),
        Err(_) => bail!("API error: {}", status),
    }
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let api = Api {
        endpoint: resolve_endpoint(&cli),
        caller: cli.caller.clone(),
        client: reqwest::Client::new(),
    };

    if let Err(e) = run(&api, &cli.command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(api: &Api, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Status => show_status(api).await,
        Commands::Phase => {
            let phase: PhaseResponse = api.get(&["phase"]).await?;
            println!("{} (step {} of 6)", phase.phase, phase.index + 1);
            Ok(())
        }
        Commands::Voter { address } => show_voter(api, address).await,
        Commands::Proposals => {
            let proposals: Vec<Standing> = api.get(&["proposals"]).await?;
            print_standings(&proposals, None);
            Ok(())
        }
        Commands::Proposal { id } => {
            let id = id.to_string();
            let p: Standing = api.get(&["proposals", id.as_str()]).await?;
            println!("#{} {} ({} votes)", p.proposal_id, p.description, p.vote_count);
            Ok(())
        }
        Commands::Winner => show_winner(api).await,
        Commands::Results => {
            let results: ResultsResponse = api.get(&["results"]).await?;
            println!("Votes cast: {}", results.votes_cast);
            print_standings(&results.standings, results.winning_proposal_id);
            Ok(())
        }
        Commands::Events { since } => show_events(api, *since).await,
        Commands::AddVoter { address } => {
            send(api, &["voters"], Some(serde_json::json!({ "address": address }))).await
        }
        Commands::Propose { description } => {
            let body = serde_json::json!({ "description": description });
            send(api, &["proposals"], Some(body)).await
        }
        Commands::Vote { proposal_id } => {
            let body = serde_json::json!({ "proposal_id": proposal_id });
            send(api, &["votes"], Some(body)).await
        }
        Commands::StartProposals => send(api, &["phase", "start-proposals"], None).await,
        Commands::EndProposals => send(api, &["phase", "end-proposals"], None).await,
        Commands::StartVoting => send(api, &["phase", "start-voting"], None).await,
        Commands::EndVoting => send(api, &["phase", "end-voting"], None).await,
        Commands::Tally => send(api, &["phase", "tally"], None).await,
    }
}

// ============ Commands ============

async fn send(
    api: &Api,
    segments: &[&str],
    body: Option<serde_json::Value>,
) -> anyhow::Result<()> {
    let result: CommandResponse = api.post(segments, body).await?;
    println!("Accepted (event #{})", result.record.sequence);
    println!("{}", serde_json::to_string_pretty(&result.record.event)?);
    Ok(())
}

async fn show_status(api: &Api) -> anyhow::Result<()> {
    let status: StatusResponse = api.get(&["status"]).await?;

    println!();
    println!("WolfVote Election Status (votectl v{})", env!("CARGO_PKG_VERSION"));
    println!("========================================");
    println!();
    println!("Election:     {}", status.name);
    println!("Admin:        {}", status.admin);
    println!("Phase:        {}", status.phase);
    println!("Voters:       {}", status.voter_count);
    println!("Proposals:    {}", status.proposal_count);
    println!("Votes cast:   {}", status.votes_cast);
    match status.winning_proposal_id {
        Some(id) => println!("Winner:       #{}", id),
        None => println!("Winner:       NONE"),
    }
    println!("Last event:   #{}", status.last_event);
    println!("Uptime:       {}s", status.uptime_seconds);
    println!();

    Ok(())
}

async fn show_voter(api: &Api, address: &str) -> anyhow::Result<()> {
    let voter: VoterResponse = api.get(&["voters", address]).await?;

    println!("Voter:        {}", voter.address);
    println!("Registered:   {}", voter.is_registered);
    println!("Has voted:    {}", voter.has_voted);
    if let Some(id) = voter.voted_proposal_id {
        println!("Voted for:    #{}", id);
    }
    Ok(())
}

async fn show_winner(api: &Api) -> anyhow::Result<()> {
    let winner: WinnerResponse = api.get(&["winner"]).await?;

    match (winner.winning_proposal_id, winner.proposal) {
        (Some(_), Some(p)) => {
            println!("Winner: #{} {} ({} votes)", p.proposal_id, p.description, p.vote_count)
        }
        (Some(id), None) => println!("Winner: #{}", id),
        (None, _) => println!("Votes not tallied yet (phase: {})", winner.phase),
    }
    Ok(())
}

async fn show_events(api: &Api, since: u64) -> anyhow::Result<()> {
    let mut url = api.url(&["events"])?;
    url.query_pairs_mut().append_pair("since", &since.to_string());
    let events: Vec<EventRecord> = api.fetch(url).await?;

    println!("{:<8} {:<32} {}", "SEQ", "EMITTED", "EVENT");
    println!("{}", "-".repeat(72));
    for record in events {
        println!("{:<8} {:<32} {}", record.sequence, record.emitted_at, record.event);
    }
    Ok(())
}

fn print_standings(standings: &[Standing], winner: Option<u64>) {
    println!("{:<6} {:<8} {}", "ID", "VOTES", "DESCRIPTION");
    println!("{}", "-".repeat(60));
    for p in standings {
        let line = format!("{:<6} {:<8} {}", p.proposal_id, p.vote_count, p.description);
        if winner == Some(p.proposal_id) {
            println!("\x1b[1;32m{}\x1b[0m", line); // Bold green
        } else {
            println!("{}", line);
        }
    }
}
