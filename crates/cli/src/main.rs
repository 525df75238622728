//! Simulator command line.
//!
//! Loads a flat program image (little-endian 64-bit instruction words),
//! builds the engine from defaults, an optional JSON configuration file,
//! and command-line overrides, runs to completion, and prints statistics.

use clap::Parser;
use forksim_core::common::error::ConfigError;
use forksim_core::config::{BpredKind, CacheConfig, IcacheSel, SimConfig, SpecUpdate};
use forksim_core::{Engine, Memory};
use std::fs;
use std::process;

#[derive(Parser, Debug)]
#[command(
    name = "forksim",
    version,
    about = "Cycle-accurate out-of-order simulator with speculative multithreading",
    long_about = "Runs a flat program image on a simulated out-of-order core that forks a\n\
                  sibling hardware thread down the correct path of every detected\n\
                  misprediction. Options mirror the simulator configuration; a JSON\n\
                  config file may set anything not exposed here."
)]
struct Cli {
    /// Program image: little-endian 64-bit instruction words.
    program: String,

    /// Load (and start) address of the program image.
    #[arg(long, default_value_t = 0x1000, value_parser = parse_addr)]
    base: u64,

    /// JSON configuration file (CLI flags override it).
    #[arg(long)]
    config: Option<String>,

    /// Maximum committed instructions (0 = unlimited).
    #[arg(long = "max-insts")]
    max_insts: Option<u64>,

    /// Instructions to fast-forward functionally before timing.
    #[arg(long)]
    fastfwd: Option<u64>,

    /// Fetch queue size (power of two).
    #[arg(long = "ifq-size")]
    ifq_size: Option<usize>,

    /// Front-end speed multiplier.
    #[arg(long = "fetch-speed")]
    fetch_speed: Option<u64>,

    /// Misprediction fetch penalty in cycles.
    #[arg(long)]
    mplat: Option<u64>,

    /// Decode width (power of two).
    #[arg(long = "decode-width")]
    decode_width: Option<usize>,

    /// Issue width (power of two).
    #[arg(long = "issue-width")]
    issue_width: Option<usize>,

    /// Commit width (power of two).
    #[arg(long = "commit-width")]
    commit_width: Option<usize>,

    /// Force strict in-order issue.
    #[arg(long)]
    inorder: bool,

    /// Do not dispatch instructions down mis-speculated paths.
    #[arg(long = "no-wrongpath")]
    no_wrongpath: bool,

    /// RUU size (power of two, >= 2).
    #[arg(long = "ruu-size")]
    ruu_size: Option<usize>,

    /// LSQ size (power of two, >= 2).
    #[arg(long = "lsq-size")]
    lsq_size: Option<usize>,

    /// Branch predictor: nottaken|taken|perfect|bimod|2lev|comb.
    #[arg(long)]
    bpred: Option<String>,

    /// Speculative predictor update point: ID|WB|CT.
    #[arg(long = "bpred-spec-update")]
    bpred_spec_update: Option<String>,

    /// L1 D-cache: `sets:bsize:assoc:policy` or `none`.
    #[arg(long = "cache-dl1")]
    cache_dl1: Option<String>,

    /// L2 D-cache: `sets:bsize:assoc:policy` or `none`.
    #[arg(long = "cache-dl2")]
    cache_dl2: Option<String>,

    /// L1 I-cache: `sets:bsize:assoc:policy`, `dl1`, `dl2`, or `none`.
    #[arg(long = "cache-il1")]
    cache_il1: Option<String>,

    /// L2 I-cache: `sets:bsize:assoc:policy`, `dl1`, `dl2`, or `none`.
    #[arg(long = "cache-il2")]
    cache_il2: Option<String>,

    /// Instruction TLB: `sets:bsize:assoc:policy` or `none`.
    #[arg(long)]
    itlb: Option<String>,

    /// Data TLB: `sets:bsize:assoc:policy` or `none`.
    #[arg(long)]
    dtlb: Option<String>,

    /// TLB miss latency in cycles.
    #[arg(long = "tlb-lat")]
    tlb_lat: Option<u64>,

    /// Integer ALU count.
    #[arg(long = "res-ialu")]
    res_ialu: Option<usize>,

    /// Integer multiplier/divider count.
    #[arg(long = "res-imult")]
    res_imult: Option<usize>,

    /// Memory port count.
    #[arg(long = "res-memport")]
    res_memport: Option<usize>,

    /// FP adder count.
    #[arg(long = "res-fpalu")]
    res_fpalu: Option<usize>,

    /// FP multiplier/divider count.
    #[arg(long = "res-fpmult")]
    res_fpmult: Option<usize>,

    /// Simultaneous live threads (<= 16).
    #[arg(long = "max-threads")]
    max_threads: Option<usize>,

    /// Fetch-stall cycles charged per successful fork.
    #[arg(long = "fork-penalty")]
    fork_penalty: Option<u64>,

    /// Fetches on one thread before the arbiter switches.
    #[arg(long = "max-fetches-before-switch")]
    max_fetches_before_switch: Option<u64>,
}

fn parse_addr(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| e.to_string())
}

fn build_config(cli: &Cli) -> Result<SimConfig, String> {
    let mut cfg = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
            serde_json::from_str(&text).map_err(|e| format!("{path}: {e}"))?
        }
        None => SimConfig::default(),
    };

    macro_rules! set {
        ($field:expr, $value:expr) => {
            if let Some(v) = $value {
                $field = v;
            }
        };
    }
    set!(cfg.run.max_insts, cli.max_insts);
    set!(cfg.run.fastfwd, cli.fastfwd);
    set!(cfg.fetch.ifq_size, cli.ifq_size);
    set!(cfg.fetch.speed, cli.fetch_speed);
    set!(cfg.fetch.mispred_penalty, cli.mplat);
    set!(cfg.width.decode, cli.decode_width);
    set!(cfg.width.issue, cli.issue_width);
    set!(cfg.width.commit, cli.commit_width);
    if cli.inorder {
        cfg.width.inorder_issue = true;
    }
    if cli.no_wrongpath {
        cfg.width.include_spec = false;
    }
    set!(cfg.window.ruu_size, cli.ruu_size);
    set!(cfg.window.lsq_size, cli.lsq_size);
    set!(cfg.res.ialu, cli.res_ialu);
    set!(cfg.res.imult, cli.res_imult);
    set!(cfg.res.memport, cli.res_memport);
    set!(cfg.res.fpalu, cli.res_fpalu);
    set!(cfg.res.fpmult, cli.res_fpmult);
    set!(cfg.threads.max_threads, cli.max_threads);
    set!(cfg.threads.fork_penalty, cli.fork_penalty);
    set!(
        cfg.threads.max_fetches_before_switch,
        cli.max_fetches_before_switch
    );
    set!(cfg.mem.tlb_miss_lat, cli.tlb_lat);

    let err = |e: ConfigError| e.to_string();
    if let Some(name) = &cli.bpred {
        cfg.bpred.kind = BpredKind::parse(name).map_err(err)?;
    }
    if let Some(name) = &cli.bpred_spec_update {
        cfg.bpred.spec_update = SpecUpdate::parse(name).map_err(err)?;
    }
    if let Some(spec) = &cli.cache_dl1 {
        cfg.mem.dl1 = CacheConfig::parse(spec, cfg.mem.dl1.hit_lat).map_err(err)?;
    }
    if let Some(spec) = &cli.cache_dl2 {
        cfg.mem.dl2 = CacheConfig::parse(spec, cfg.mem.dl2.hit_lat).map_err(err)?;
    }
    if let Some(spec) = &cli.cache_il1 {
        match spec.as_str() {
            "dl1" => cfg.mem.il1_sel = IcacheSel::Dl1,
            "dl2" => cfg.mem.il1_sel = IcacheSel::Dl2,
            "none" => cfg.mem.il1_sel = IcacheSel::None,
            _ => {
                cfg.mem.il1_sel = IcacheSel::Own;
                cfg.mem.il1 = CacheConfig::parse(spec, cfg.mem.il1.hit_lat).map_err(err)?;
            }
        }
    }
    if let Some(spec) = &cli.cache_il2 {
        match spec.as_str() {
            "dl1" => cfg.mem.il2_sel = IcacheSel::Dl1,
            "dl2" => cfg.mem.il2_sel = IcacheSel::Dl2,
            "none" => cfg.mem.il2_sel = IcacheSel::None,
            _ => {
                cfg.mem.il2_sel = IcacheSel::Own;
                cfg.mem.il2 = CacheConfig::parse(spec, cfg.mem.il2.hit_lat).map_err(err)?;
            }
        }
    }
    if let Some(spec) = &cli.itlb {
        cfg.mem.itlb = CacheConfig::parse(spec, 1).map_err(err)?;
    }
    if let Some(spec) = &cli.dtlb {
        cfg.mem.dtlb = CacheConfig::parse(spec, 1).map_err(err)?;
    }

    Ok(cfg)
}

/// Reads a flat image of little-endian 64-bit instruction words.
fn read_image(path: &str) -> Result<Vec<u64>, String> {
    let bytes = fs::read(path).map_err(|e| format!("{path}: {e}"))?;
    if bytes.len() % 8 != 0 {
        return Err(format!("{path}: image is not a whole number of words"));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match build_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("forksim: {e}");
            process::exit(1);
        }
    };

    let words = match read_image(&cli.program) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("forksim: {e}");
            process::exit(1);
        }
    };

    let mut mem = Memory::new();
    mem.load_program(cli.base, &words);

    let mut engine = match Engine::new(&cfg, mem) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("forksim: {e}");
            process::exit(1);
        }
    };

    if cfg.run.fastfwd > 0 {
        eprintln!("forksim: fast-forwarding {} instructions", cfg.run.fastfwd);
        if let Err(e) = engine.fast_forward(cfg.run.fastfwd) {
            eprintln!("forksim: {e}");
            process::exit(1);
        }
    }

    eprintln!("forksim: starting performance simulation");
    if let Err(e) = engine.run() {
        eprintln!("forksim: {e}");
        process::exit(1);
    }

    engine.stats.print();
}
