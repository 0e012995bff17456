//! Command-line front end for the I3C blaster
//!
//! Each subcommand maps onto one driver operation; `demo` runs the bring-up
//! sequence (reset addresses, scan, assign 0x30, read, DDR transfers).

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use i3c_blaster::codec::parse_int;
use i3c_blaster::{DriveStrength, I3cBlaster, NativeBackend};

#[derive(Parser)]
#[command(name = "i3c-blaster")]
#[command(about = "Drive an I3C bus through a USB I3C blaster")]
#[command(version)]
struct Args {
    /// Serial number of the blaster to use (first one found if omitted)
    #[arg(short, long, global = true)]
    serial: Option<String>,

    /// Increase log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the serial numbers of all attached blasters
    List,
    /// Scan the bus for responding addresses
    Scan,
    /// Reset all dynamic addresses (RSTDAA)
    Rstdaa,
    /// Assign a dynamic address (ENTDAA)
    Entdaa {
        #[arg(value_parser = parse_u8)]
        address: u8,
    },
    /// Private SDR write
    SdrWrite {
        #[arg(value_parser = parse_u8)]
        address: u8,
        /// Bytes to write, comma separated (`""` for none)
        #[arg(value_parser = parse_bytes)]
        data: ByteList,
    },
    /// Private SDR read
    SdrRead {
        #[arg(value_parser = parse_u8)]
        address: u8,
        #[arg(value_parser = parse_u32)]
        count: u32,
    },
    /// Private SDR write followed by a read
    SdrWriteread {
        #[arg(value_parser = parse_u8)]
        address: u8,
        /// Bytes to write, comma separated (`""` for none)
        #[arg(value_parser = parse_bytes)]
        data: ByteList,
        #[arg(value_parser = parse_u32)]
        count: u32,
    },
    /// Fetch a pending in-band interrupt
    Poll,
    /// Set the SCL frequency
    Clock {
        /// Rate in kHz
        #[arg(value_parser = parse_u32)]
        rate_khz: u32,
    },
    /// Run the bring-up sequence against the first target
    Demo,
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_int(s).map_err(|e| e.to_string())?;
    u8::try_from(value).map_err(|_| format!("{value} does not fit in a byte"))
}

/// Comma separated byte literals given as one argument
#[derive(Debug, Clone, PartialEq, Eq)]
struct ByteList(Vec<u8>);

fn parse_bytes(s: &str) -> Result<ByteList, String> {
    if s.trim().is_empty() {
        return Ok(ByteList(Vec::new()));
    }
    s.split(',').map(parse_u8).collect::<Result<_, _>>().map(ByteList)
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let value = parse_int(s).map_err(|e| e.to_string())?;
    u32::try_from(value).map_err(|_| format!("{value} is out of range"))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Command::List = args.command {
        let devices = i3c_blaster::list_devices().context("Failed to list serial ports")?;
        println!("{} i3c blaster device(s) connected: {devices:?}", devices.len());
        return Ok(());
    }

    let mut i3c = I3cBlaster::new(args.serial.as_deref());
    if !i3c.connect() {
        bail!(
            "No i3c blaster found (serial number: {})",
            args.serial.as_deref().unwrap_or("any")
        );
    }
    log::debug!("Using blaster on {}", i3c.port_name().unwrap_or("?"));

    match args.command {
        Command::List => {}
        Command::Scan => {
            let targets = i3c.i3c_scan()?;
            println!("{targets:#04x?}");
        }
        Command::Rstdaa => i3c.i3c_rstdaa()?,
        Command::Entdaa { address } => match i3c.i3c_entdaa(address)? {
            Some(info) => println!("assigned {address:#04x}: {info:02x?}"),
            None => println!("no target took part in ENTDAA"),
        },
        Command::SdrWrite { address, data } => i3c.i3c_sdr_write(address, &data.0)?,
        Command::SdrRead { address, count } => {
            println!("{:02x?}", i3c.i3c_sdr_read(address, count)?);
        }
        Command::SdrWriteread {
            address,
            data,
            count,
        } => {
            println!("{:02x?}", i3c.i3c_sdr_writeread(address, &data.0, count)?);
        }
        Command::Poll => match i3c.i3c_poll()? {
            Some(ibi) => println!("IBI from {:#04x}: {:02x?}", ibi.address, ibi.payload),
            None => println!("no IBI pending"),
        },
        Command::Clock { rate_khz } => i3c.i3c_clock(rate_khz)?,
        Command::Demo => demo(&mut i3c)?,
    }

    Ok(())
}

fn demo(i3c: &mut I3cBlaster<NativeBackend>) -> Result<()> {
    const TARGET: u8 = 0x30;

    println!("Resetting previously assigned dynamic addresses");
    i3c.i3c_rstdaa().context("RSTDAA failed")?;

    println!("Scanning for targets");
    println!("Found targets on bus: {:#04x?}", i3c.i3c_scan()?);

    // Only targets supporting ENTDAA take part; a NAK is harmless
    println!("Assigning dynamic address {TARGET:#04x}");
    match i3c.i3c_entdaa(TARGET)? {
        Some(info) => println!("PID/BCR/DCR: {info:02x?}"),
        None => println!("No target took part"),
    }

    println!("Scanning for targets");
    println!("Found targets on bus: {:#04x?}", i3c.i3c_scan()?);

    println!("Reading up to 10 bytes from register 0x00");
    let data = i3c
        .i3c_sdr_writeread(TARGET, &[0x00], 10)
        .context("SDR write-read failed")?;
    println!("Result: {data:02x?}");

    println!("Setting SDA/SCL drive strength to 4 mA");
    i3c.i3c_drivestrength(DriveStrength::Ma4)?;

    println!("HDR-DDR write");
    i3c.i3c_ddr_write(TARGET, 0x00, &[0x1234, 0x5678])
        .context("DDR write failed")?;

    println!("HDR-DDR read");
    let words = i3c.i3c_ddr_read(TARGET, 0x00, 10).context("DDR read failed")?;
    println!("Result: {words:04x?}");

    println!("HDR-DDR write followed by read");
    let result = i3c
        .i3c_ddr_writeread(TARGET, 0x00, 0x00, &[0x1234, 0x5678], 10)
        .context("DDR write-read failed")?;
    println!("Written: {}, read: {:04x?}", result.written, result.data);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_args() {
        assert_eq!(parse_u8("0x30"), Ok(0x30));
        assert_eq!(parse_u8("48"), Ok(48));
        assert!(parse_u8("0x100").is_err());
        assert!(parse_u8("zz").is_err());
        assert_eq!(parse_u32("12500"), Ok(12500));
        assert!(parse_u32("-1").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "i3c-blaster",
            "-vv",
            "--serial",
            "E661",
            "sdr-writeread",
            "0x30",
            "0x00,0x01",
            "4",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.serial.as_deref(), Some("E661"));
        match args.command {
            Command::SdrWriteread {
                address,
                data,
                count,
            } => {
                assert_eq!(address, 0x30);
                assert_eq!(data, ByteList(vec![0x00, 0x01]));
                assert_eq!(count, 4);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_sdr_write_without_data() {
        let args = Args::try_parse_from(["i3c-blaster", "sdr-write", "0x30", ""]).unwrap();
        match args.command {
            Command::SdrWrite { address, data } => {
                assert_eq!(address, 0x30);
                assert_eq!(data, ByteList(Vec::new()));
            }
            _ => panic!("wrong subcommand"),
        }

        // The byte list is required so the read count cannot be mistaken for it
        assert!(Args::try_parse_from(["i3c-blaster", "sdr-write", "0x30"]).is_err());
        assert!(Args::try_parse_from(["i3c-blaster", "sdr-writeread", "0x30", "4"]).is_err());
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_bytes("0x1,2,0xff"), Ok(ByteList(vec![1, 2, 0xff])));
        assert_eq!(parse_bytes(" "), Ok(ByteList(Vec::new())));
        assert!(parse_bytes("0x1,,0x2").is_err());
        assert!(parse_bytes("0x100").is_err());
    }

    #[test]
    fn test_command_layout_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
