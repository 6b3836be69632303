// enveye is a tool for comparing application environment snapshots
// Copyright (C) 2025  Peoples Grocers LLC
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//
// To purchase a license under different terms contact admin@peoplesgrocers.com
// To request changes, report bugs, or give user feedback contact
// marxism@peoplesgrocers.com
//

use crate::flags;
use enveye::{explain_with_config, Diagnostic, DiffReport, ProviderConfig};

pub fn run(flags: &flags::Explain) -> Vec<Diagnostic> {
    let report = match DiffReport::from_file(&flags.report) {
        Ok(report) => report,
        Err(diagnostic) => return vec![diagnostic],
    };

    match explain_with_config(&report, ProviderConfig::from_env()) {
        Ok(explanation) => {
            println!("{}", explanation);
            Vec::new()
        }
        Err(diagnostic) => vec![diagnostic],
    }
}
