mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use solty::abi::{AbiError, AbiFunctions, RoutineCache};
use solty::config::{ConfigError, Definitions};
use solty::layout::StorageLayout;
use solty::types::{
    FunctionKind, FunctionType, ParseTypeError, StateMutability, Type, TypeError, TypeParser,
};

use crate::logging::LoggingError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Logging(#[from] LoggingError),

    #[error("Type name error: {0}")]
    Parse(#[from] ParseTypeError),

    #[error("Type error: {0}")]
    Type(#[from] TypeError),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Contract not found: {0}")]
    ContractNotFound(String),
}

#[derive(Parser)]
#[command(name = "solty")]
#[command(about = "Inspect types, storage layouts and ABI routines of contract definitions")]
struct Cli {
    /// TOML definitions file (structs, enums, contracts, logging)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overrides the definitions file (e.g. "debug" or "solty=trace")
    #[arg(short, long, global = true, env = "SOLTY_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the storage layout of a contract
    Layout {
        /// Name of the contract
        #[arg(long)]
        contract: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print identifier, sizes and encoding facts of a type
    Inspect {
        /// Type name, e.g. "uint256[3] memory"
        ty: String,
    },

    /// Check convertibility between two types
    Convert {
        from: String,
        to: String,
    },

    /// Print the ABI encoder for a tuple of types and every routine it uses
    Encoder {
        /// Comma separated type names
        #[arg(short, long)]
        types: String,

        /// Use the non-standard packed encoding
        #[arg(long)]
        packed: bool,

        /// Encode as seen from a library (storage references by slot)
        #[arg(long)]
        library: bool,
    },

    /// Print the ABI decoder for a tuple of types and every routine it uses
    Decoder {
        /// Comma separated type names
        #[arg(short, long)]
        types: String,

        /// Decode from memory instead of call data
        #[arg(long)]
        from_memory: bool,
    },

    /// Print the canonical signature and selector of an external function
    Selector {
        name: String,

        /// Parameter type names
        params: Vec<String>,
    },
}

fn load_definitions(path: Option<&PathBuf>) -> Result<Definitions, AppError> {
    Ok(match path {
        Some(path) => Definitions::from_file(path)?,
        None => Definitions::default(),
    })
}

fn fact<T: std::fmt::Display>(value: Result<T, TypeError>) -> String {
    match value {
        Ok(v) => v.to_string(),
        Err(e) => format!("- ({})", e),
    }
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut defs = load_definitions(cli.config.as_ref())?;
    if let Some(level) = cli.log_level {
        defs.logging.level = level;
    }
    logging::init(&defs.logging)?;
    let reg = defs.build_registry()?;
    debug!(definitions = reg.len(), "loaded definitions");

    match cli.command {
        Commands::Layout { contract, json } => {
            let id = reg
                .lookup(&contract)
                .ok_or_else(|| AppError::ContractNotFound(contract.clone()))?;
            let layout = StorageLayout::for_contract(&reg, id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&layout)?);
            } else {
                for entry in &layout.storage {
                    let label = layout
                        .types
                        .get(&entry.ty)
                        .map(|info| info.label.as_str())
                        .unwrap_or(entry.ty.as_str());
                    println!(
                        "slot {:>3} offset {:>2}  {}.{}: {}",
                        entry.slot, entry.offset, entry.contract, entry.label, label
                    );
                }
            }
            Ok(())
        }
        Commands::Inspect { ty } => {
            let ty = TypeParser::new(&reg).parse(&ty)?;
            println!("type:               {}", ty.describe(false));
            println!("identifier:         {}", ty.identifier());
            println!("canonical name:     {}", fact(ty.canonical_name(&reg)));
            println!("value type:         {}", ty.is_value_type());
            println!("stack slots:        {}", ty.size_on_stack());
            if ty.can_be_stored() {
                println!("storage bytes:      {}", fact(ty.storage_bytes(&reg)));
                println!("storage slots:      {}", fact(ty.storage_size(&reg)));
            }
            println!("dynamically encoded: {}", fact(ty.is_dynamically_encoded(&reg)));
            println!("calldata head size: {}", fact(ty.calldata_head_size(&reg)));
            if let Ok(false) = ty.is_dynamically_encoded(&reg) {
                println!("calldata size:      {}", fact(ty.calldata_encoded_size(&reg, true)));
            }
            println!(
                "interface type:     {}",
                fact(ty.interface_type(&reg, false).map(|t| t.describe(false)))
            );
            Ok(())
        }
        Commands::Convert { from, to } => {
            let parser = TypeParser::new(&reg);
            let from = parser.parse(&from)?;
            let to = parser.parse(&to)?;
            println!("implicit: {}", from.is_implicitly_convertible_to(&reg, &to));
            println!("explicit: {}", from.is_explicitly_convertible_to(&reg, &to));
            match Type::common_type(&reg, &from, &to) {
                Some(common) => println!("common:   {}", common.describe(false)),
                None => println!("common:   none"),
            }
            Ok(())
        }
        Commands::Encoder {
            types,
            packed,
            library,
        } => {
            let types = TypeParser::new(&reg).parse_list(&types)?;
            let mut cache = RoutineCache::new();
            let name = {
                let mut abi = AbiFunctions::new(&reg, &mut cache);
                if packed {
                    abi.tuple_encoder_packed(&types, &types)?
                } else {
                    abi.tuple_encoder(&types, &types, library)?
                }
            };
            info!(routine = %name, routines = cache.len(), "generated encoder");
            print!("{}", cache.requested_functions().render());
            Ok(())
        }
        Commands::Decoder { types, from_memory } => {
            let types = TypeParser::new(&reg).parse_list(&types)?;
            let mut cache = RoutineCache::new();
            let name = AbiFunctions::new(&reg, &mut cache).tuple_decoder(&types, from_memory)?;
            info!(routine = %name, routines = cache.len(), "generated decoder");
            print!("{}", cache.requested_functions().render());
            Ok(())
        }
        Commands::Selector { name, params } => {
            let parser = TypeParser::new(&reg);
            let params = params
                .iter()
                .map(|p| parser.parse(p))
                .collect::<Result<Vec<_>, _>>()?;
            let function =
                FunctionType::new(FunctionKind::External, params, Vec::new(), StateMutability::NonPayable);
            let signature = function.external_signature(&reg, &name, false)?;
            let selector = function.selector(&reg, &name, false)?;
            println!("{} 0x{}", signature, hex::encode(selector));
            Ok(())
        }
    }
}
