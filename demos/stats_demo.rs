use clap::Parser;
use clap::ValueEnum;
use probe_hash::ChainedTable;
use probe_hash::MixedTable;
use probe_hash::Probing;
use probe_hash::ProbingTable;
use probe_hash::Table;
use probe_hash::TableStats;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Variant {
    Chained,
    Mixed,
    Probing,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Strategy {
    Linear,
    Quadratic,
    Double,
}

impl From<Strategy> for Probing {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Linear => Probing::Linear,
            Strategy::Quadratic => Probing::Quadratic,
            Strategy::Double => Probing::DoubleHashing,
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    /// Initial capacity
    #[arg(short = 'c', long = "capacity", default_value_t = 8)]
    capacity: usize,

    /// Number of values to insert
    #[arg(short = 'n', long = "count", default_value_t = 1000)]
    count: u64,

    /// Every n-th inserted value is deleted again (0 disables deletion)
    #[arg(short = 'd', long = "delete_every", default_value_t = 0)]
    delete_every: u64,

    #[arg(short = 'v', long = "variant", value_enum, default_value_t = Variant::Chained)]
    variant: Variant,

    /// Probe sequence of the probing table
    #[arg(short = 'p', long = "probing", value_enum, default_value_t = Strategy::Linear)]
    probing: Strategy,
}

fn fill<T: Table<u64>>(table: &mut T, args: &Args) {
    for value in 0..args.count {
        table.insert(value);
    }
    if args.delete_every > 0 {
        for value in (0..args.count).step_by(args.delete_every as usize) {
            table.delete(&value);
        }
    }

    println!("Inserted {} values into table", args.count);
    println!("Final capacity: {}", table.capacity());
    println!("Final load factor: {:.2}%", table.load_factor() * 100.0);
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    println!(
        "Creating {:?} table with capacity: {}",
        args.variant, args.capacity
    );

    let stats: TableStats = match args.variant {
        Variant::Chained => {
            let mut table: ChainedTable<u64> = ChainedTable::with_capacity(args.capacity);
            fill(&mut table, &args);
            table.debug_stats()
        }
        Variant::Mixed => {
            let mut table: MixedTable<u64> = MixedTable::with_capacity(args.capacity);
            fill(&mut table, &args);
            table.debug_stats()
        }
        Variant::Probing => {
            let mut table: ProbingTable<u64> =
                ProbingTable::with_capacity(args.capacity, args.probing.into());
            fill(&mut table, &args);
            table.debug_stats()
        }
    };

    stats.print();
}
