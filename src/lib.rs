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

pub mod collect;
pub mod diagnostics;
pub mod diff;
pub mod explain;
pub mod path;
pub mod remote;
pub mod report;
pub mod snapshot;

pub use collect::{AppType, CollectRequest, Collector, PowerShell, Shell};
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollector, DiagnosticLevel};
pub use diff::{diff, diff_with_options, DiffOptions, SequenceMode};
pub use explain::{
    explain, explain_with_config, CommandProvider, ExplanationProvider, OpenAiProvider,
    ProviderConfig,
};
pub use path::{Segment, SnapshotPath};
pub use remote::{
    dispatch, CommandTransport, HostResult, RemoteOutcome, RemoteTransport, DEFAULT_TEMPLATE,
    DEFAULT_TIMEOUT_SECS,
};
pub use report::{DiffEntry, DiffReport, DiffSummary, NodeKind};
pub use snapshot::{compare_snapshots, Compression, Snapshot};
