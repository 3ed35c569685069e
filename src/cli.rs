use clap::{Parser, Subcommand};
use ewizard_common::Label;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ewizard")]
#[command(about = "E-waste identification, bin routing and sorting", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 履歴CSVのパス（設定ファイルより優先）
    #[arg(long, global = true)]
    pub history: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像1枚をスキャンして分別先を判定
    Scan {
        /// 画像ファイルのパス
        #[arg(required = true)]
        image: PathBuf,

        /// 信頼度の閾値（0.0-1.0、省略時は設定値）
        #[arg(short, long)]
        threshold: Option<f64>,

        /// AIガイダンスを使わない（固定文面のみ）
        #[arg(long)]
        no_advice: bool,

        /// サーボで仕分ける
        #[arg(long)]
        actuate: bool,

        /// 閾値未満のときに適用する分類 (cpu/ram_stick/flash_drive)
        #[arg(long = "override", value_name = "LABEL")]
        override_label: Option<Label>,

        /// 閾値未満のとき対話で分類を選ぶ
        #[arg(long)]
        ask: bool,

        /// 検出枠付き画像の保存先
        #[arg(long)]
        annotated_out: Option<PathBuf>,

        /// 結果をJSONで出力
        #[arg(long)]
        json: bool,
    },

    /// フォルダ内の画像を順にスキャン
    Batch {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 信頼度の閾値（0.0-1.0、省略時は設定値）
        #[arg(short, long)]
        threshold: Option<f64>,

        /// AIガイダンスを使わない（固定文面のみ）
        #[arg(long)]
        no_advice: bool,

        /// サーボで仕分ける
        #[arg(long)]
        actuate: bool,
    },

    /// スキャン履歴を表示/削除
    History {
        /// 表示件数
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// 履歴を全件削除
        #[arg(long)]
        clear: bool,
    },

    /// 履歴の集計を表示
    Stats,

    /// 品目ラベルと分別先の一覧
    Labels,

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
