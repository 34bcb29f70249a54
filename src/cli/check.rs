// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Check command - fetch and summarize a build's results

use miette::Result;
use std::path::PathBuf;
use std::time::Duration;

use super::report;
use crate::checker::{CouchDbStore, ResultChecker};
use crate::utils::create_spinner;

/// Run the check command
pub async fn run(
    id: String,
    couchdb: String,
    file: Option<PathBuf>,
    database: String,
    wait: u64,
    _verbose: bool,
) -> Result<()> {
    let store = CouchDbStore::new(&couchdb, &database, Duration::from_secs(wait)).map_err(report)?;
    let checker = ResultChecker::new(store);

    let spinner = create_spinner(&format!("Fetching results of {}", id));
    let result = checker.check(&id, file.as_deref()).await;
    spinner.finish_and_clear();

    let check = result.map_err(report)?;
    check.print();
    Ok(())
}
