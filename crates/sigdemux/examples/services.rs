use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use sigdemux::psi::table::Pmt;
use sigdemux::time::DateTime;
use sigdemux::{Service, SignalizationDemux, SignalizationHandler};

#[derive(Debug)]
struct AppArgs {
    path: PathBuf,
    verbose: bool,
    services: Vec<String>,
}

impl AppArgs {
    const HELP: &str = "\
各サービスとPIDの情報を表示するコマンド

USAGE:
  services [OPTIONS] [PATH]

FLAGS:
  -h, --help          このヘルプを表示する
  -v, --verbose       サービスの変化を逐次表示する

OPTIONS:
  -s, --service NAME  指定したサービスだけを表示する（複数指定可）

ARGS:
  <PATH>              情報を表示するTSファイルのパス
";

    pub fn parse() -> Result<AppArgs, Box<dyn std::error::Error>> {
        let mut args = pico_args::Arguments::from_env();

        if args.contains(["-h", "--help"]) {
            println!("{}", Self::HELP);
            std::process::exit(0);
        }

        let verbose = args.contains(["-v", "--verbose"]);
        let services = args.values_from_str(["-s", "--service"])?;

        Ok(AppArgs {
            path: args.free_from_str()?,
            verbose,
            services,
        })
    }
}

struct Handler {
    verbose: bool,
    last_utc: Option<DateTime>,
}

impl SignalizationHandler for Handler {
    fn on_utc(&mut self, utc: &DateTime, _: u8) {
        self.last_utc = Some(utc.clone());
    }

    fn on_ts_id(&mut self, ts_id: u16, table_id: u8) {
        if self.verbose {
            println!("TS id: 0x{:04X} (table id 0x{:02X})", ts_id, table_id);
        }
    }

    fn on_service(&mut self, ts_id: Option<u16>, service: &Service, pmt: Option<&Pmt>, removed: bool) {
        if !self.verbose {
            return;
        }

        let state = if removed { "removed" } else { "updated" };
        print!("[{}] {}", state, service);
        if let Some(ts_id) = ts_id {
            print!(" in TS 0x{:04X}", ts_id);
        }
        if let Some(pmt) = pmt {
            print!(" with {} streams", pmt.streams.len());
        }
        println!();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = AppArgs::parse()?;

    env_logger::init();

    let f = File::open(&*args.path)?;
    let f = BufReader::with_capacity(188 * 1024, f);

    let handler = Handler {
        verbose: args.verbose,
        last_utc: None,
    };
    let mut demux = if args.services.is_empty() {
        SignalizationDemux::new(handler)
    } else {
        let mut demux = SignalizationDemux::with_table_ids(handler, &[]);
        for name in &args.services {
            demux.add_filtered_service(name);
        }
        demux
    };

    for packet in sigdemux::Packet::iter(f) {
        demux.feed_packet(&packet?);
    }

    if let Some(ts_id) = demux.ts_id() {
        println!("TS id: 0x{:04X}", ts_id);
    }
    if let Some(network_id) = demux.network_id() {
        println!("Network id: 0x{:04X}", network_id);
    }
    if let Some(utc) = &demux.handler().last_utc {
        println!("UTC: {:?}", utc);
    }
    println!();

    for service in demux.services() {
        // サービス識別とサービス名
        print!("{}", service);
        if let Some(provider) = service.provider() {
            print!(" - {}", provider);
        }
        if let Some(lcn) = service.lcn() {
            print!(" (LCN {})", lcn);
        }
        println!();
    }
    println!();

    println!(" PID :   Packets Class           Services");
    for pid in demux.pids() {
        let Some(ctx) = demux.pid_context(pid) else {
            continue;
        };
        let services: Vec<String> = ctx.services.iter().map(|id| format!("0x{:04X}", id)).collect();
        println!(
            "{:04X} : {:9} {:15} {}{}",
            pid.get(),
            ctx.packets,
            format!("{:?}", ctx.pid_class),
            services.join(", "),
            if ctx.scrambled { " (scrambled)" } else { "" },
        );
    }

    Ok(())
}
