//! 仕分けアクチュエータ
//!
//! 分別先を物理動作に変換する。失敗はログに残して `false` を返すだけで、
//! スキャン結果や履歴には影響させない。

mod servo;

pub use servo::{angle_to_duty_ns, ServoSorter};

pub trait Sorter {
    /// 分別先へ仕分ける。成功したら `true`
    fn actuate(&self, bin_category: &str) -> bool;
}

impl<T: Sorter + ?Sized> Sorter for &T {
    fn actuate(&self, bin_category: &str) -> bool {
        (**self).actuate(bin_category)
    }
}
