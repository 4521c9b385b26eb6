//! Per-thread record recycling pool.
//!
//! Der Decoder materialisiert für jeden Record-Frame einen [`Record`];
//! Records, die ein Converter konsumiert hat, wandern zurück in den Pool
//! des aufrufenden Threads. Reine Allokations-Optimierung — semantisch
//! unsichtbar, jeder Thread besitzt seinen eigenen Pool.

use std::cell::RefCell;

use crate::record::Record;

/// Obergrenze pro Thread; alles darüber wird normal verworfen.
const MAX_POOLED: usize = 64;

thread_local! {
    static POOL: RefCell<Vec<Record>> = const { RefCell::new(Vec::new()) };
}

/// Returns a cleared record, recycled when the pool has one.
pub(crate) fn acquire() -> Record {
    POOL.with(|pool| pool.borrow_mut().pop()).unwrap_or_default()
}

/// Clears the record and retains it for the next [`acquire`] on this thread.
pub(crate) fn release(mut record: Record) {
    record.clear();
    POOL.with(|pool| {
        let mut pool = pool.borrow_mut();
        if pool.len() < MAX_POOLED {
            pool.push(record);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ScalarKey;

    const KEY: ScalarKey<i32> = ScalarKey::new("k");

    /// acquire liefert immer einen leeren Record, auch nach release
    /// eines gefüllten.
    #[test]
    fn released_records_come_back_cleared() {
        let mut record = acquire();
        record.set_scalar(&KEY, 5).unwrap();
        release(record);

        let recycled = acquire();
        assert!(recycled.is_empty());
    }

    /// Der Pool läuft nicht unbegrenzt voll.
    #[test]
    fn pool_is_bounded() {
        for _ in 0..(MAX_POOLED * 2) {
            release(Record::new());
        }
        POOL.with(|pool| assert!(pool.borrow().len() <= MAX_POOLED));
    }
}
