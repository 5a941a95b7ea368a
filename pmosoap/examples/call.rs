//! Appelle une opération SOAP et affiche le Body de la réponse
//!
//! Usage:
//!   cargo run --example call -- <wsdl> <method> [Name=Value ...]
//!   cargo run --example call -- --config <file.yaml> <method> [Name=Value ...]
//!
//! Exemple:
//!   cargo run --example call -- http://www.dneonline.com/calculator.asmx?WSDL Add intA=2 intB=3
//!
//! Avec `--config`, les variables `PMOSOAP__CLIENT__*` surchargent le fichier.

use pmosoap::{Params, SoapClient, SoapClientConfig};
use std::env;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || (args[1] == "--config" && args.len() < 4) {
        eprintln!("Usage: {} <wsdl> <method> [Name=Value ...]", args[0]);
        eprintln!("       {} --config <file.yaml> <method> [Name=Value ...]", args[0]);
        std::process::exit(1);
    }

    let (client, rest) = if args[1] == "--config" {
        let config = SoapClientConfig::load(Some(Path::new(&args[2])))?;
        (config.build_client()?, &args[3..])
    } else {
        (SoapClient::new(&args[1])?, &args[2..])
    };

    let method = &rest[0];
    let mut params = Params::new();
    for arg in &rest[1..] {
        match arg.split_once('=') {
            Some((name, value)) => params.insert(name, value),
            None => {
                eprintln!("Error: parameter '{arg}' must be Name=Value");
                std::process::exit(1);
            }
        }
    }

    match client.call(method, params).await {
        Ok(response) => {
            println!("HTTP {}", response.status);
            if let Some(fault) = response.fault() {
                println!("{fault}");
            } else {
                println!("{}", response.body_text());
            }
        }
        Err(err) => {
            eprintln!("Error: {err}");
            if let Some(payload) = err.payload() {
                eprintln!("\nEnvelope sent:\n{}", String::from_utf8_lossy(payload));
            }
            std::process::exit(1);
        }
    }

    Ok(())
}
