use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::Value;

use crate::codec::Codec;
use crate::config::NodeConfig;
use crate::cryptography::Keybase;
use crate::gov::ParamChange;
use crate::node::{Msg, Node, SignedMsg};
use crate::pos::Query;
use crate::store::MemStore;
use crate::types::{Address, PageRequest};

#[derive(Parser)]
#[command(author, version, about = "Proof-of-stake validator node and keybase", long_about = None)]
pub struct Cli {
    /// JSON node configuration
    #[arg(short, long, default_value = "julius.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage local signing keys
    #[command(subcommand)]
    Keys(KeysCommand),
    /// Sign a transaction with a local key and apply it to the node state
    Tx(TxArgs),
    /// Read staking state
    #[command(subcommand)]
    Query(QueryCommand),
    /// Run the block loop
    #[command(subcommand)]
    Node(NodeCommand),
}

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Create a new key
    Add {
        #[arg(short, long)]
        passphrase: String,
    },
    List,
    Show {
        address: Address,
    },
    Delete {
        address: Address,
        #[arg(short, long)]
        passphrase: String,
    },
    /// Sign a UTF-8 message and print the hex signature
    Sign {
        address: Address,
        message: String,
        #[arg(short, long)]
        passphrase: String,
    },
    /// Change the passphrase of a key
    Update {
        address: Address,
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Write an encrypted armored key
    Export {
        address: Address,
        #[arg(short, long)]
        passphrase: String,
        #[arg(long)]
        export_passphrase: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Read an encrypted armored key from a file
    Import {
        file: PathBuf,
        #[arg(long)]
        export_passphrase: String,
        #[arg(short, long)]
        passphrase: String,
    },
    /// Print the unencrypted private key as hex
    ExportRaw {
        address: Address,
        #[arg(short, long)]
        passphrase: String,
    },
    ImportRaw {
        hex: String,
        #[arg(short, long)]
        passphrase: String,
    },
}

#[derive(Args)]
pub struct TxArgs {
    /// Signing key address
    #[arg(long)]
    pub from: Address,
    #[arg(short, long)]
    pub passphrase: String,
    #[command(subcommand)]
    pub msg: TxCommand,
}

#[derive(Subcommand)]
pub enum TxCommand {
    /// Transfer coins to another account
    Send {
        to: Address,
        amount: u64,
    },
    Stake {
        amount: u64,
    },
    Unstake,
    Unjail,
    /// Change a `module/name` parameter to a JSON value
    ModifyParam {
        key: String,
        value: String,
    },
    /// Hand ownership of a protected parameter to another address
    TransferOwnership {
        key: String,
        owner: Address,
    },
}

#[derive(Args, Clone, Copy)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// 0 uses max_validators
    #[arg(long, default_value_t = 0)]
    pub limit: usize,
}

impl From<PageArgs> for PageRequest {
    fn from(args: PageArgs) -> Self {
        PageRequest::new(args.page, args.limit)
    }
}

#[derive(Subcommand)]
pub enum QueryCommand {
    /// Balance and sequence of an account
    Account { address: Address },
    Validators(PageArgs),
    Validator { address: Address },
    Staked(PageArgs),
    Unstaking(PageArgs),
    Unstaked(PageArgs),
    SigningInfo { address: Address },
    SigningInfos(PageArgs),
    Pool,
    Dao,
    Params,
    /// Governance parameters and the ACL
    Gov,
}

#[derive(Subcommand)]
pub enum NodeCommand {
    Run {
        /// Stop after this many blocks
        #[arg(long)]
        blocks: Option<u64>,
    },
}

pub struct CliHandler {
    config: NodeConfig,
}

impl CliHandler {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    fn keybase(&self) -> Result<Keybase<MemStore>> {
        let store = MemStore::load(&self.config.keybase_path)?;
        Ok(Keybase::new(store, Codec::new(), self.config.kdf_iterations))
    }

    fn save_keybase(&self, keybase: Keybase<MemStore>) -> Result<()> {
        keybase.into_inner()?.save(&self.config.keybase_path)?;
        Ok(())
    }

    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Keys(cmd) => self.keys(cmd),
            Commands::Tx(args) => self.tx(args),
            Commands::Query(cmd) => self.query(cmd),
            Commands::Node(NodeCommand::Run { blocks }) => {
                let mut node = Node::open(&self.config)?;
                info!("Starting node at height {}", node.last_block().height);
                node.run(blocks, Duration::from_millis(self.config.block_interval_ms)).await?;
                Ok(())
            }
        }
    }

    fn keys(&self, cmd: KeysCommand) -> Result<()> {
        let keybase = self.keybase()?;
        match cmd {
            KeysCommand::Add { passphrase } => {
                let pair = keybase.create(&passphrase)?;
                println!("{} {}", pair.address, pair.public_key);
            }
            KeysCommand::List => {
                for pair in keybase.list()? {
                    println!("{} {}", pair.address, pair.public_key);
                }
            }
            KeysCommand::Show { address } => {
                let pair = keybase.get(&address)?;
                println!("{} {}", pair.address, pair.public_key);
            }
            KeysCommand::Delete { address, passphrase } => keybase.delete(&address, &passphrase)?,
            KeysCommand::Sign { address, message, passphrase } => {
                let (signature, public_key) = keybase.sign(&address, &passphrase, message.as_bytes())?;
                println!("{} {}", hex::encode(signature), public_key);
            }
            KeysCommand::Update { address, old, new } => {
                keybase.update(&address, &old, &new)?;
            }
            KeysCommand::Export { address, passphrase, export_passphrase, out } => {
                let armored = keybase.export_encrypted_armor(&address, &passphrase, &export_passphrase)?;
                match out {
                    Some(path) => fs::write(&path, armored).with_context(|| format!("writing {}", path.display()))?,
                    None => print!("{}", armored),
                }
            }
            KeysCommand::Import { file, export_passphrase, passphrase } => {
                let armored = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
                let pair = keybase.import_encrypted_armor(&armored, &export_passphrase, &passphrase)?;
                println!("{} {}", pair.address, pair.public_key);
            }
            KeysCommand::ExportRaw { address, passphrase } => {
                println!("{}", keybase.export_raw_key(&address, &passphrase)?);
            }
            KeysCommand::ImportRaw { hex, passphrase } => {
                let pair = keybase.import_raw_key(&hex, &passphrase)?;
                println!("{} {}", pair.address, pair.public_key);
            }
        }
        self.save_keybase(keybase)
    }

    fn tx(&self, args: TxArgs) -> Result<()> {
        let msg = match args.msg {
            TxCommand::Send { to, amount } => Msg::Send { to, amount },
            TxCommand::Stake { amount } => Msg::Stake { amount },
            TxCommand::Unstake => Msg::Unstake,
            TxCommand::Unjail => Msg::Unjail,
            TxCommand::ModifyParam { key, value } => {
                let value: Value = serde_json::from_str(&value).context("parameter value must be JSON")?;
                Msg::ModifyParam { key, change: ParamChange::Value(value) }
            }
            TxCommand::TransferOwnership { key, owner } => Msg::ModifyParam {
                key,
                change: ParamChange::TransferOwnership(owner),
            },
        };

        let mut node = Node::open(&self.config)?;
        let sequence = node.accounts().sequence(node.store(), &args.from)?;

        let keybase = self.keybase()?;
        let (signature, public_key) = keybase.sign(&args.from, &args.passphrase, &msg.sign_bytes(sequence)?)?;
        let tx = SignedMsg { msg, sequence, public_key, signature };
        if !tx.verify()? {
            bail!("signature from {} does not verify", args.from);
        }

        node.deliver(&tx)?;
        node.save()?;
        info!("Applied {:?} from {}", tx.msg, args.from);
        Ok(())
    }

    fn query(&self, cmd: QueryCommand) -> Result<()> {
        let node = Node::open(&self.config)?;
        let query = match cmd {
            QueryCommand::Account { address } => {
                let account = node.accounts().account(node.store(), &address)?;
                println!("{}", serde_json::to_string_pretty(&account)?);
                return Ok(());
            }
            QueryCommand::Validators(page) => Query::Validators(page.into()),
            QueryCommand::Validator { address } => Query::Validator(address),
            QueryCommand::Staked(page) => Query::StakedValidators(page.into()),
            QueryCommand::Unstaking(page) => Query::UnstakingValidators(page.into()),
            QueryCommand::Unstaked(page) => Query::UnstakedValidators(page.into()),
            QueryCommand::SigningInfo { address } => Query::SigningInfo(address),
            QueryCommand::SigningInfos(page) => Query::SigningInfos(page.into()),
            QueryCommand::Pool => Query::Pool,
            QueryCommand::Dao => Query::Dao,
            QueryCommand::Params => Query::Params,
            QueryCommand::Gov => {
                let params = node.gov().params(node.store())?;
                println!("{}", serde_json::to_string_pretty(&params)?);
                return Ok(());
            }
        };
        let bytes = node.staking().query(node.store(), &query)?;
        let text = String::from_utf8(bytes).map_err(|e| anyhow!("query output is not UTF-8: {}", e))?;
        println!("{}", text);
        Ok(())
    }
}
