use super::config::{TpccConfig, DIST_PER_WARE, MAX_OL_PER_ORDER, MIN_OL_PER_ORDER};
use crate::random::{rand_f64, urand_double, urand_int};
use rand::rngs::SmallRng;

// Constant C of the non-uniform generator, fixed per field class.
fn nurand_constant(a: u64, is_load: bool) -> u64 {
    match a {
        255 => {
            if is_load {
                250
            } else {
                150
            }
        }
        1023 => 987,
        8191 => 5987,
        _ => unreachable!("invalid nurand window"),
    }
}

/// Non-uniform random over [x, y]: two uniform draws OR-ed together and
/// folded back into the range.
pub fn nurand_int<const A: u64, const IS_LOAD: bool>(rng: &mut SmallRng, x: u64, y: u64) -> u64 {
    let c = nurand_constant(A, IS_LOAD);
    ((urand_int(rng, 0, A) | urand_int(rng, x, y)) + c) % (y - x + 1) + x
}

const LASTNAME_PARTS: [&str; 10] = [
    "BAR", "OUGHT", "ABLE", "PRI", "PRES", "ESE", "ANTI", "CALLY", "ATION", "EING",
];

/// Customer last name from a three-digit syllable index.
pub fn make_clast(num: u64) -> String {
    debug_assert!(num < 1000);
    format!(
        "{}{}{}",
        LASTNAME_PARTS[(num / 100) as usize],
        LASTNAME_PARTS[(num / 10 % 10) as usize],
        LASTNAME_PARTS[(num % 10) as usize]
    )
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
    Payment = 0,
    NewOrder = 1,
    /// Enumerated for the mix accounting; not generated.
    OrderStatus = 2,
}

impl TxnKind {
    pub const COUNT: usize = 3;

    pub fn name(&self) -> &'static str {
        match self {
            TxnKind::Payment => "Payment",
            TxnKind::NewOrder => "NewOrder",
            TxnKind::OrderStatus => "OrderStatus",
        }
    }
}

pub fn next_txn_kind(config: &TpccConfig, rng: &mut SmallRng) -> TxnKind {
    if rand_f64(rng) < config.perc_payment {
        TxnKind::Payment
    } else {
        TxnKind::NewOrder
    }
}

/// Each worker is pinned to one home warehouse, round robin over threads.
pub fn home_warehouse(config: &TpccConfig, thread_id: usize) -> u64 {
    thread_id as u64 % config.num_warehouses + 1
}

fn remote_warehouse(config: &TpccConfig, rng: &mut SmallRng, home: u64) -> u64 {
    loop {
        let w = urand_int(rng, 1, config.num_warehouses);
        if w != home {
            return w;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInput {
    pub w_id: u64,
    pub d_id: u64,
    pub c_id: u64,
    pub c_w_id: u64,
    pub c_d_id: u64,
    pub h_amount: f64,
}

impl PaymentInput {
    /// 85% of payments hit the home warehouse and district; the rest pick
    /// a remote customer (when more than one warehouse exists).
    pub fn generate(config: &TpccConfig, rng: &mut SmallRng, w_id: u64) -> Self {
        let d_id = urand_int(rng, 1, DIST_PER_WARE);
        let h_amount = urand_double(rng, 100, 500_000, 100);
        let home = config.num_warehouses == 1 || urand_int(rng, 1u64, 100) <= 85;
        let (c_w_id, c_d_id) = if home {
            (w_id, d_id)
        } else {
            (
                remote_warehouse(config, rng, w_id),
                urand_int(rng, 1, DIST_PER_WARE),
            )
        };
        let c_id = nurand_int::<1023, false>(rng, 1, config.cust_per_dist);
        PaymentInput {
            w_id,
            d_id,
            c_id,
            c_w_id,
            c_d_id,
            h_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineInput {
    pub ol_i_id: u64,
    pub ol_supply_w_id: u64,
    pub ol_quantity: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderInput {
    pub w_id: u64,
    pub d_id: u64,
    pub c_id: u64,
    pub o_entry_d: u64,
    /// Any line supplied by a non-home warehouse.
    pub remote: bool,
    pub lines: Vec<OrderLineInput>,
}

impl NewOrderInput {
    /// 5 to 15 lines; each line has a 1% chance of a remote supplier.
    pub fn generate(config: &TpccConfig, rng: &mut SmallRng, w_id: u64) -> Self {
        let d_id = urand_int(rng, 1, DIST_PER_WARE);
        let c_id = nurand_int::<1023, false>(rng, 1, config.cust_per_dist);
        let ol_cnt = urand_int(rng, MIN_OL_PER_ORDER, MAX_OL_PER_ORDER);
        let mut remote = false;
        let lines = (0..ol_cnt)
            .map(|_| {
                let ol_i_id = nurand_int::<8191, false>(rng, 1, config.max_items);
                let local =
                    config.num_warehouses == 1 || urand_int(rng, 1u64, 100) > 1;
                let ol_supply_w_id = if local {
                    w_id
                } else {
                    remote = true;
                    remote_warehouse(config, rng, w_id)
                };
                OrderLineInput {
                    ol_i_id,
                    ol_supply_w_id,
                    ol_quantity: urand_int(rng, 1, 10),
                }
            })
            .collect();
        NewOrderInput {
            w_id,
            d_id,
            c_id,
            o_entry_d: 2023,
            remote,
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_for_thread;
    use clap::Parser;

    fn config(args: &[&str]) -> TpccConfig {
        let mut argv = vec!["tpcc"];
        argv.extend_from_slice(args);
        TpccConfig::parse_from(argv)
    }

    #[test]
    fn test_nurand_stays_in_range() {
        let mut rng = rng_for_thread(0);
        for _ in 0..10_000 {
            let v = nurand_int::<1023, false>(&mut rng, 1, 3000);
            assert!((1..=3000).contains(&v));
        }
    }

    #[test]
    fn test_make_clast() {
        assert_eq!(make_clast(0), "BARBARBAR");
        assert_eq!(make_clast(999), "EINGEINGEING");
        assert_eq!(make_clast(371), "PRICALLYOUGHT");
    }

    #[test]
    fn test_payment_input_single_warehouse_is_always_home() {
        let cfg = config(&[]);
        let mut rng = rng_for_thread(1);
        for _ in 0..100 {
            let input = PaymentInput::generate(&cfg, &mut rng, 1);
            assert_eq!(input.c_w_id, 1);
            assert_eq!(input.c_d_id, input.d_id);
            assert!((1.0..=5000.0).contains(&input.h_amount));
        }
    }

    #[test]
    fn test_payment_input_remote_customers_exist_with_many_warehouses() {
        let cfg = config(&["--num-warehouses", "4"]);
        let mut rng = rng_for_thread(2);
        let mut remote = 0;
        for _ in 0..1000 {
            let input = PaymentInput::generate(&cfg, &mut rng, 2);
            assert_eq!(input.w_id, 2);
            if input.c_w_id != 2 {
                remote += 1;
            }
        }
        // About 15% remote.
        assert!(remote > 50 && remote < 350, "remote count {}", remote);
    }

    #[test]
    fn test_new_order_input_shape() {
        let cfg = config(&[]);
        let mut rng = rng_for_thread(3);
        for _ in 0..100 {
            let input = NewOrderInput::generate(&cfg, &mut rng, 1);
            assert!((MIN_OL_PER_ORDER..=MAX_OL_PER_ORDER)
                .contains(&(input.lines.len() as u64)));
            assert!(!input.remote);
            for line in &input.lines {
                assert!((1..=cfg.max_items).contains(&line.ol_i_id));
                assert!((1..=10).contains(&line.ol_quantity));
                assert_eq!(line.ol_supply_w_id, 1);
            }
        }
    }

    #[test]
    fn test_home_warehouse_round_robin() {
        let cfg = config(&["--num-warehouses", "3"]);
        assert_eq!(home_warehouse(&cfg, 0), 1);
        assert_eq!(home_warehouse(&cfg, 1), 2);
        assert_eq!(home_warehouse(&cfg, 2), 3);
        assert_eq!(home_warehouse(&cfg, 3), 1);
    }
}
