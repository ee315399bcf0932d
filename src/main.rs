use std::fs;

use clap::{Arg, Command};
use tracing::{error, info};

use ctfsim::logging::{self, LogConfig, LogOutput};
use ctfsim::scenario::ScenarioConfig;
use ctfsim::simulation::{EpisodeSummary, SimulationEngine};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("ctfsim")
        .version("0.1.0")
        .about("キャプチャー・ザ・フラッグ シミュレーション (Capture the Flag Simulation)")
        .long_about("ターン制・複数チームのキャプチャー・ザ・フラッグシミュレーション\n\
                     シナリオファイルに従いランダムウォークのドライバでエピソードを実行します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .required(true)
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("シナリオのシード値を上書き")
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("N")
                .value_parser(clap::value_parser!(u64).range(1..))
                .help("最大ティック数を上書き")
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .value_name("N")
                .value_parser(clap::value_parser!(u64).range(1..))
                .default_value("1")
                .help("シードを1ずつ変えたN個のWorldを並列実行")
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("エピソード結果をYAMLで書き出す")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .value_parser(clap::builder::ValueParser::new(|s: &str| s.parse::<LogOutput>()))
                .default_value("console")
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|s| logging::parse_log_level(s))
            .unwrap_or_else(|| logging::level_for_verbosity(verbose_level)),
        output: matches
            .get_one::<LogOutput>("log-output")
            .copied()
            .unwrap_or(LogOutput::Console),
        ..LogConfig::default()
    };

    let _guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    let options = RunOptions {
        info_only: matches.get_flag("info"),
        seed: matches.get_one::<u64>("seed").copied(),
        ticks: matches.get_one::<u64>("ticks").copied(),
        batch: matches.get_one::<u64>("batch").copied().unwrap_or(1),
        output: matches.get_one::<String>("output").cloned(),
        verbose_level,
    };

    // シナリオファイルの処理
    if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        if let Err(e) = run_scenario(scenario_path, &options) {
            error!("{}", e);
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    }
}

struct RunOptions {
    info_only: bool,
    seed: Option<u64>,
    ticks: Option<u64>,
    batch: u64,
    output: Option<String>,
    verbose_level: u8,
}

/// シナリオファイルを読み込んで実行
fn run_scenario(scenario_path: &str, options: &RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut scenario = ScenarioConfig::from_file(scenario_path)?;

    if let Some(seed) = options.seed {
        scenario.sim.seed = seed;
    }
    if let Some(ticks) = options.ticks {
        scenario.sim.max_ticks = ticks;
    }

    if options.verbose_level > 0 {
        info!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    if options.info_only {
        scenario.print_summary();
        return Ok(());
    }

    let summaries = if options.batch > 1 {
        run_batch(&scenario, options.batch, options.verbose_level)?
    } else {
        let mut engine = SimulationEngine::new(scenario, options.verbose_level)?;
        vec![engine.run()?]
    };

    for summary in &summaries {
        print_result(summary);
    }

    if let Some(path) = &options.output {
        fs::write(path, serde_yaml::to_string(&summaries)?)?;
        info!("結果を書き出しました: {}", path);
    }

    Ok(())
}

/// シードの異なる独立したWorldを並列実行
///
/// World同士は可変状態を共有しないため、各エピソードをブロッキングタスクとして実行します。
fn run_batch(
    scenario: &ScenarioConfig,
    count: u64,
    verbose_level: u8,
) -> Result<Vec<EpisodeSummary>, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread().build()?;
    let base_seed = scenario.sim.seed;

    info!("バッチ実行開始: {} エピソード (シード {}〜)", count, base_seed);

    runtime.block_on(async {
        let handles: Vec<_> = (0..count)
            .map(|offset| {
                let scenario = scenario.clone();
                tokio::task::spawn_blocking(move || {
                    let seed = base_seed.wrapping_add(offset);
                    SimulationEngine::with_seed(&scenario, seed, verbose_level)
                        .and_then(|mut engine| engine.run())
                })
            })
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.await??);
        }
        Ok::<_, Box<dyn std::error::Error>>(summaries)
    })
}

fn print_result(summary: &EpisodeSummary) {
    println!("=== エピソード結果: {} (シード {}) ===", summary.scenario, summary.seed);
    println!("総ティック数: {}", summary.ticks);
    for reward in &summary.rewards {
        println!("  {}: 占領 {}本", reward.team, reward.captured);
    }
    for capture in &summary.captures {
        println!("  フラッグ{} → {} (ティック {})", capture.flag, capture.team, capture.tick);
    }
    println!();
}
