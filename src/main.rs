use fundline::operations::engine::get_liquid_ether;
use fundline::signer::Keystore;
use fundline::{config::Config, with_keystore_signer, with_private_key_signer, ContractKind, Environment};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let env = match Environment::connect(&config).await {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", config.ledger_rpc_url, e);
            std::process::exit(1);
        }
    };

    // Attach a signer if one is configured
    let env = match attach_signer(&env, &config) {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Failed to attach signer: {}", e);
            std::process::exit(1);
        }
    };

    match env.ledger().block_number().await {
        Ok(block) => tracing::info!("Chain {} at block {}", env.options().chain_id, block),
        Err(e) => tracing::warn!("Could not read block number: {}", e),
    }

    match env.wallet_address() {
        Some(address) => match env.ledger().balance(address).await {
            Ok(balance) => tracing::info!("Signer {} holds {} wei", address, balance),
            Err(e) => tracing::warn!("Could not read balance of {}: {}", address, e),
        },
        None => tracing::info!("No signer configured; read-only session"),
    }

    let engine = match env.address_of(ContractKind::Engine) {
        Ok(address) => address,
        Err(e) => {
            eprintln!("Deployment error: {}", e);
            std::process::exit(1);
        }
    };
    match get_liquid_ether(&env, engine).await {
        Ok(liquid) => tracing::info!("Engine {} liquid ether: {}", engine, liquid),
        Err(e) => {
            eprintln!("Engine query failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn attach_signer(env: &Environment, config: &Config) -> Result<Environment, String> {
    if let Some(key) = &config.private_key {
        return with_private_key_signer(env, key).map_err(|e| e.to_string());
    }
    if let (Some(path), Some(password)) = (&config.keystore_path, &config.keystore_password) {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read keystore {}: {}", path, e))?;
        let keystore = Keystore::from_json(&json).map_err(|e| e.to_string())?;
        return with_keystore_signer(env, &keystore, password).map_err(|e| e.to_string());
    }
    Ok(env.clone())
}
