use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use freespace::config::{Cli, Command, FreeArgs};
use freespace::display::print_free_rooms;
use freespace::parser::load_events;
use freespace::schedule::{availability, build_directory, query_moment, RoomFilter};
use freespace::web;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Web(args) => web::start_server(args).await?,
        Command::Free(args) => print_free(&args)?,
    }

    Ok(())
}

/// Offline mode: free rooms straight from a cached feed file
fn print_free(args: &FreeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let window = args.window.window()?;
    let events = load_events(&args.file)?;
    let directory = build_directory(&events, &args.building);
    let (date, time) = query_moment(Local::now().naive_local(), args.date, args.time, &window);
    let filter = RoomFilter::new(args.floor.clone(), args.room.clone());

    let view = availability(&directory, &events, date, time, &filter, &window);
    print_free_rooms(
        &args.building,
        date,
        time,
        &view.free_now,
        &view.free_soon,
        &window,
        args.limit,
    );
    Ok(())
}
