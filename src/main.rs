//! robokit entry point.
//!
//! ## CLI Subcommands
//!
//! - `robokit check [FILE]` - Build every configured service and list its models
//! - `robokit schema TYPE` - Print the parameter schema of a model type
//! - `robokit types` - List the registered model types
//! - `robokit version` / `robokit help`

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use robokit_core::config::{self, RobotConfig};
use robokit_core::registry::{ClientConn, RpcMux, SubtypeService};
use robokit_core::telemetry::init_logging;
use robokit_core::vision::{self, ModelFactories, Vision, VisionService};
use robokit_core::{reconfigure, Closer, LocalResources, Reconfigurable, ResourceHandle};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "check" => {
            let env = config::load_env();
            if let Err(e) = init_logging(&env.log) {
                eprintln!("Logging setup failed: {}", e);
                return ExitCode::from(2u8);
            }
            let path = args.get(2).map(PathBuf::from).unwrap_or(env.config_path);
            match run_check(&path).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("Check failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "schema" => {
            let Some(model_type) = args.get(2) else {
                eprintln!("Missing model type");
                print_usage();
                return ExitCode::from(2u8);
            };
            match ModelFactories::with_builtins().and_then(|f| f.parameter_schema(model_type)) {
                Ok(schema) => match serde_json::to_string_pretty(&schema) {
                    Ok(text) => {
                        println!("{}", text);
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        eprintln!("Failed to render schema: {}", e);
                        ExitCode::FAILURE
                    }
                },
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        "types" => match ModelFactories::with_builtins() {
            Ok(factories) => {
                for model_type in factories.types() {
                    println!("{}", model_type);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        },
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("robokit {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "robokit - robot resource core v{}

USAGE:
    robokit [COMMAND] [ARGS]

COMMANDS:
    check [FILE]   Build every service in the robot file and list its models
    schema TYPE    Print the parameter schema of a model type
    types          List the model types that can be registered
    version        Show version information
    help           Show this help message

ENVIRONMENT:
    ROBOKIT_CONFIG      Robot file (default: robot.toml)
    ROBOKIT_LOG_LEVEL   Log filter (default: info)
    ROBOKIT_LOG_FORMAT  json or pretty (default: json)
    ROBOKIT_LOG_FILE    Write logs to this file instead of stderr

EXIT CODES:
    0  Success
    1  Failure
    2  Usage or setup error
",
        version
    );
}

/// Build each configured vision service behind its shim, serve it over an
/// in-process connection, and list its models through the client proxy.
async fn run_check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let robot = RobotConfig::from_file(path)?;
    let subtypes = robokit_core::default_subtypes()?;
    let factories = Arc::new(ModelFactories::with_builtins()?);
    let resources = Arc::new(LocalResources::new());

    let served = Arc::new(SubtypeService::new(vision::subtype()));
    let mut shims: Vec<(String, Arc<Reconfigurable<dyn VisionService>>)> = Vec::new();

    for service in &robot.services {
        let attributes = service.vision_attributes()?;
        let built: Arc<dyn VisionService> =
            Arc::new(Vision::new(resources.clone(), &attributes, factories.clone()).await?);
        let raw = ResourceHandle::new::<dyn VisionService>("builtin", built);
        let shim = Arc::new(reconfigure::wrap::<dyn VisionService>(&raw)?);

        let handle = ResourceHandle::new::<dyn VisionService>("reconfigurable", shim.clone());
        resources.insert(vision::named(&service.name), handle.clone());
        served.add(&service.name, handle);
        shims.push((service.name.clone(), shim));
    }

    let mux = Arc::new(RpcMux::new());
    subtypes.serve(&HashMap::from([(vision::subtype(), served)]), &mux)?;
    let conn: Arc<dyn ClientConn> = mux;

    for (name, _) in &shims {
        let client = subtypes
            .client(&vision::subtype(), conn.clone(), name)?
            .downcast::<dyn VisionService>()
            .ok_or("client proxy does not implement the vision service")?;
        let (detectors, classifiers, segmenters) = futures::try_join!(
            client.detector_names(),
            client.classifier_names(),
            client.segmenter_names()
        )?;
        println!("{}:", name);
        println!("  detectors:   {}", detectors.join(", "));
        println!("  classifiers: {}", classifiers.join(", "));
        println!("  segmenters:  {}", segmenters.join(", "));
    }

    for (name, shim) in shims {
        if let Err(e) = shim.close().await {
            tracing::warn!(service = %name, error = %e, "service close failed");
        }
    }
    Ok(())
}
