use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use async_trait::async_trait;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use qvl_consensus::{
    Disposition, FetchReason, InboundLedgers, NodeConfig, SystemClock, Validation, ValidationNode,
};
use qvl_ledger::{mismatch, InMemoryLedgerStore, Ledger, LedgerAncestryView, LedgerStore};
use qvl_types::{LedgerId, NetTime, PublicKey, Seq};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Mismatch(args) => cmd_mismatch(args, format),
        Command::Config(args) => cmd_config(args, format),
        Command::Replay(args) => cmd_replay(args, format).await,
    }
}

fn load_view(path: &Path) -> anyhow::Result<LedgerAncestryView> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing view {}", path.display()))
}

fn cmd_mismatch(args: MismatchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let a = load_view(&args.a)?;
    let b = load_view(&args.b)?;
    let seq = mismatch(&a, &b);
    let agree = seq > a.seq().min(b.seq());

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "mismatch": seq, "agree": agree });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("A: seq {} {}", a.seq().to_string().bold(), a.id().short_hex().yellow());
            println!("B: seq {} {}", b.seq().to_string().bold(), b.id().short_hex().yellow());
            if agree {
                println!("{} Views agree through seq {}", "✓".green().bold(), seq - 1);
            } else {
                println!(
                    "{} Views may diverge from seq {}",
                    "✗".red().bold(),
                    seq.to_string().bold()
                );
            }
        }
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = NodeConfig::load(&args.path)
        .with_context(|| format!("loading {}", args.path.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            println!("{} Configuration valid", "✓".green().bold());
            println!("  Quorum: {}", config.quorum.to_string().bold());
            println!("  Trusted validators: {}", config.validators.trusted.len());
            for entry in &config.validators.trusted {
                println!("    {}", entry.master.short_id().cyan());
            }
            println!("  Listed validators: {}", config.validators.listed.len());
            println!(
                "  Fetch: queue {}, in flight {}",
                config.fetch.queue_capacity, config.fetch.max_in_flight
            );
            println!("  Close offset: {}s", config.clock.close_offset_secs);
        }
    }
    Ok(())
}

/// A replay scenario: a local chain plus validations to feed through a node.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Ledgers in the scenario chain, genesis included.
    pub chain_length: u32,
    /// How many chain ledgers the node holds locally; the rest are
    /// acquired on demand. Defaults to the whole chain.
    #[serde(default)]
    pub held_locally: Option<u32>,
    #[serde(default)]
    pub validations: Vec<ScenarioValidation>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioValidation {
    pub signing_key: PublicKey,
    #[serde(default)]
    pub ledger_seq: Option<Seq>,
    /// Defaults to the chain ledger at `ledger_seq`.
    #[serde(default)]
    pub ledger_hash: Option<LedgerId>,
    #[serde(default = "default_full")]
    pub full: bool,
    #[serde(default)]
    pub sign_time: u32,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_full() -> bool {
    true
}

fn default_source() -> String {
    "replay".into()
}

#[derive(Debug, Serialize)]
pub struct ReplayOutcome {
    pub source: String,
    pub signing_key: String,
    pub ledger_seq: Option<Seq>,
    pub ledger: String,
    pub outcome: String,
    pub relay: bool,
    /// Highest sequence recorded for the signer after this validation.
    pub highest_seq: Option<Seq>,
}

#[derive(Debug, Serialize)]
pub struct ValidatedLedger {
    pub ledger: String,
    pub seq: Seq,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub outcomes: Vec<ReplayOutcome>,
    pub relayed: usize,
    pub validated: Option<ValidatedLedger>,
}

/// Serves ledgers the node does not hold from the rest of the scenario chain.
struct ScenarioInbound {
    remote: InMemoryLedgerStore,
    local: Arc<InMemoryLedgerStore>,
}

#[async_trait]
impl InboundLedgers for ScenarioInbound {
    async fn acquire(&self, hash: LedgerId, _seq: Seq, reason: FetchReason) -> Option<Arc<Ledger>> {
        let ledger = self.remote.ledger_by_hash(&hash)?;
        tracing::debug!(ledger = %hash.short_hex(), %reason, "serving scenario ledger");
        self.local.insert_shared(Arc::clone(&ledger));
        Some(ledger)
    }
}

fn build_chain(length: u32) -> Vec<Ledger> {
    let mut chain = vec![Ledger::genesis(NetTime::from_secs(0))];
    for i in 1..length {
        let mut tx_root = [0u8; 32];
        tx_root[..4].copy_from_slice(&i.to_be_bytes());
        let next = chain[i as usize - 1].child(NetTime::from_secs(i * 10), tx_root);
        chain.push(next);
    }
    chain
}

/// Run a scenario through a fresh node and collect the outcomes.
pub async fn replay(config: &NodeConfig, scenario: &Scenario) -> anyhow::Result<ReplayReport> {
    if scenario.chain_length == 0 {
        bail!("chain_length must be at least 1");
    }
    let chain = build_chain(scenario.chain_length);
    let held = scenario.held_locally.unwrap_or(scenario.chain_length) as usize;

    let local = Arc::new(InMemoryLedgerStore::new());
    let remote = InMemoryLedgerStore::new();
    for (i, ledger) in chain.iter().enumerate() {
        if i < held {
            local.insert(ledger.clone());
        } else {
            remote.insert(ledger.clone());
        }
    }

    let inbound = Arc::new(ScenarioInbound {
        remote,
        local: local.clone(),
    });
    let clock = Arc::new(SystemClock::with_offset(config.clock.close_offset_secs));
    let node = ValidationNode::start(config, local, inbound, clock)?;

    let mut outcomes = Vec::with_capacity(scenario.validations.len());
    for entry in &scenario.validations {
        let hash = entry
            .ledger_hash
            .or_else(|| {
                let index = entry.ledger_seq?.checked_sub(1)?;
                chain.get(index as usize).map(Ledger::id)
            })
            .unwrap_or_default();

        let mut validation = Validation::new(
            entry.signing_key,
            hash,
            entry.ledger_seq,
            NetTime::from_secs(entry.sign_time),
        );
        if !entry.full {
            validation = validation.partial();
        }
        let validation = Arc::new(validation);

        let admission = node.evaluate(&validation, &entry.source);
        let (outcome, highest_seq) = match admission.disposition {
            Disposition::MissingSequence => ("missing sequence".to_string(), None),
            Disposition::Unlisted => ("unlisted".to_string(), None),
            Disposition::Admitted { node: id, status } => {
                (status.to_string(), node.store().highest_seq(&id))
            }
        };
        outcomes.push(ReplayOutcome {
            source: entry.source.clone(),
            signing_key: entry.signing_key.short_id(),
            ledger_seq: entry.ledger_seq,
            ledger: hash.short_hex(),
            outcome,
            relay: admission.relay,
            highest_seq,
        });
    }

    let validated = node.validated().map(|view| ValidatedLedger {
        ledger: view.id().to_hex(),
        seq: view.seq(),
    });
    node.shutdown().await;

    let relayed = outcomes.iter().filter(|o| o.relay).count();
    Ok(ReplayReport {
        outcomes,
        relayed,
        validated,
    })
}

async fn cmd_replay(args: ReplayArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => {
            NodeConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => NodeConfig::default(),
    };
    let text = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&text)
        .with_context(|| format!("parsing scenario {}", args.scenario.display()))?;

    let report = replay(&config, &scenario).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for o in &report.outcomes {
                let seq = o.ledger_seq.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
                let highest = o.highest_seq.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
                let decision = if o.relay { "relay".green() } else { "drop".dimmed() };
                println!(
                    "{:<10} {} seq {:>6} {} {:<16} {} (highest {})",
                    o.source,
                    o.signing_key.cyan(),
                    seq,
                    o.ledger.yellow(),
                    o.outcome,
                    decision,
                    highest
                );
            }
            println!(
                "\n{} validations, {} relayed",
                report.outcomes.len(),
                report.relayed.to_string().bold()
            );
            match &report.validated {
                Some(v) => println!(
                    "{} Validated ledger: seq {} {}",
                    "✓".green().bold(),
                    v.seq,
                    v.ledger.yellow()
                ),
                None => println!("No ledger validated."),
            }
        }
    }
    Ok(())
}
