//! PN532 tag reader
//!
//! Configures the controller, then prints the UID of every tag that enters
//! the field.
//!
//! # Usage
//! ```bash
//! # Raspberry Pi, PN532 on /dev/i2c-1 at 0x24
//! pn532-reader
//!
//! # No hardware: a simulated controller with a tag in the field
//! pn532-reader --simulate --once
//!
//! # Settings from a JSON file, then PN532_* environment variables
//! pn532-reader --config reader.json --json-events
//! ```

use std::time::Duration;

use anyhow::Context;
use pn532_link::{
    BusBackend, Config, EventSink, ExchangeError, JsonLinesSink, Pn532, RppalBackend,
    SimulatedChip, TracingSink,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pause between tag reads so one tag is not reported continuously
const REARM_DELAY: Duration = Duration::from_millis(500);

struct Options {
    simulate: bool,
    once: bool,
    json_events: bool,
    config_path: Option<String>,
}

impl Options {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut options = Options {
            simulate: false,
            once: false,
            json_events: false,
            config_path: None,
        };
        let mut args = args.iter().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--simulate" => options.simulate = true,
                "--once" => options.once = true,
                "--json-events" => options.json_events = true,
                "--config" => {
                    let path = args.next().context("--config needs a file path")?;
                    options.config_path = Some(path.clone());
                }
                other => anyhow::bail!("unknown argument {other}"),
            }
        }
        Ok(options)
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pn532_link=debug,pn532_reader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = Options::parse(&args)?;

    // Load configuration
    let config = match &options.config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {path}"))?;
            Config::from_json(&text)
                .with_context(|| format!("parsing {path}"))?
                .with_vars(|name| std::env::var(name).ok())
        }
        None => Config::from_env(),
    };
    tracing::debug!("Configuration: {}", serde_json::to_string(&config)?);

    if options.simulate {
        let chip = SimulatedChip::pn532();
        chip.set_address(config.address);
        chip.set_target(Some(vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0x80]));
        dispatch(chip, &config, &options)
    } else {
        dispatch(RppalBackend, &config, &options)
    }
}

fn dispatch<B: BusBackend>(backend: B, config: &Config, options: &Options) -> anyhow::Result<()> {
    if options.json_events {
        run(backend, config, options, JsonLinesSink::new(std::io::stderr()))
    } else {
        run(backend, config, options, TracingSink)
    }
}

fn run<B: BusBackend, S: EventSink>(
    backend: B,
    config: &Config,
    options: &Options,
    sink: S,
) -> anyhow::Result<()> {
    let mut pn532 = Pn532::with_sink(backend, config, sink)
        .with_context(|| format!("opening PN532 on I2C channel {}", config.channel))?;

    if !pn532.configure_device(None) {
        tracing::warn!("Continuing without SAM configuration acknowledgement");
    }

    match pn532.firmware_version(Duration::from_secs(1)) {
        Ok(version) => tracing::info!(
            "Found PN5{:02x} firmware {}.{} (support {:#04x})",
            version.ic,
            version.version,
            version.revision,
            version.support
        ),
        Err(e) => tracing::warn!("Could not read firmware version: {}", e),
    }

    tracing::info!("Waiting for tags");
    loop {
        match pn532.read_passive_target(config.default_timeout()) {
            Ok(Some(target)) => {
                println!("{}", target.uid_hex());
                tracing::info!(
                    "Tag {:?} (SENS_RES {:02x?}, SEL_RES {:#04x})",
                    target.tag_type(),
                    target.sens_res,
                    target.sel_res
                );
                if options.once {
                    break;
                }
                std::thread::sleep(REARM_DELAY);
            }
            Ok(None) => tracing::debug!("Controller reported no target"),
            Err(ExchangeError::TimedOut) => tracing::info!("No NFC tag in range"),
            Err(ExchangeError::NotAcknowledged) => {
                tracing::warn!("InListPassiveTarget was not acknowledged, retrying")
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    pn532.close();
    Ok(())
}
