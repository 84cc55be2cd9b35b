//! # wallpaper-cache CLI
//!
//! Command-line interface for the wallpaper cache.
//!
//! ## Usage
//! ```bash
//! wallpaper-cache import ~/Pictures/Wallpapers
//! wallpaper-cache previous --script ~/bin/set-wallpaper.sh
//! wallpaper-cache stats --output json
//! ```

mod cli;

use wallpaper_cache::Result;

fn main() -> Result<()> {
    cli::run()
}
