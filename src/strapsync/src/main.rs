#[macro_use]
extern crate log;

use std::{io, path::PathBuf};

use anyhow::anyhow;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use dotenv::dotenv;
use strapsync_codec::{
    Packet, PacketData,
    constants::{CodeTable, PacketType},
    history::{HistoricalRecord, parse_history},
};

#[derive(Parser)]
pub struct StrapSyncCli {
    #[clap(subcommand)]
    pub subcommand: StrapSyncCommand,
}

#[derive(Subcommand)]
pub enum StrapSyncCommand {
    ///
    /// Decode a hex encoded frame and print its contents
    ///
    Decode { frame: String },
    ///
    /// Build a frame and print it as hex
    ///
    Encode {
        /// Packet kind, by name or number
        #[arg(long, value_parser = parse_kind)]
        kind: PacketType,
        #[arg(long, default_value_t = 0)]
        seq: u8,
        #[arg(long)]
        code: u8,
        /// Hex encoded payload
        #[arg(long, default_value = "")]
        data: String,
    },
    ///
    /// Parse a capture of concatenated historical data frames
    ///
    ParseCapture {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    ///
    /// Generate Shell completions
    ///
    Completions { shell: Shell },
}

fn parse_kind(value: &str) -> Result<PacketType, String> {
    match value.parse::<u8>() {
        Ok(code) => {
            PacketType::from_u8(code).ok_or_else(|| format!("unknown packet kind {code}"))
        }
        Err(_) => value
            .parse()
            .map_err(|_| format!("unknown packet kind `{value}`")),
    }
}

fn main() -> anyhow::Result<()> {
    if let Err(error) = dotenv() {
        println!("{}", error);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = StrapSyncCli::parse();
    match cli.subcommand {
        StrapSyncCommand::Decode { frame } => {
            let bytes = hex::decode(frame.trim())?;
            let packet = Packet::decode(&bytes)?;
            println!("{}", packet);
            match PacketData::from_packet(&packet) {
                Ok(data) => println!("{:#?}", data),
                Err(error) => error!("Failed to decode payload: {}", error),
            }
            Ok(())
        }
        StrapSyncCommand::Encode {
            kind,
            seq,
            code,
            data,
        } => {
            let data = hex::decode(data.trim())?;
            let frame = Packet::new(kind, seq, code, data).encode()?;
            println!("{}", hex::encode(frame));
            Ok(())
        }
        StrapSyncCommand::ParseCapture { file, json } => {
            let bytes = std::fs::read(&file)?;
            let (records, failure) = match parse_history(&bytes) {
                Ok(records) => (records, None),
                Err(partial) => {
                    let error = anyhow!(
                        "capture failed at byte {}: {}",
                        partial.offset,
                        partial.source
                    );
                    (partial.records, Some(error))
                }
            };

            print_records(&records, json)?;
            info!("{} records from {}", records.len(), file.display());

            match failure {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
        StrapSyncCommand::Completions { shell } => {
            let mut command = StrapSyncCli::command();
            let bin_name = command.get_name().to_string();
            generate(shell, &mut command, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn print_records(records: &[HistoricalRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    for record in records {
        println!(
            "{}  hr: {:>3}  rr: {:?}",
            record.time().format("%Y-%m-%d %H:%M:%S"),
            record.heart_rate,
            record.rr
        );
    }
    Ok(())
}
