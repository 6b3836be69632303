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

use std::path::PathBuf;

xflags::xflags! {
    cmd enveye {
        /// Compare the environment context of two snapshot files
        cmd compare {
            /// Baseline snapshot (the known-good environment)
            required old: PathBuf

            /// Snapshot to check against the baseline
            required new: PathBuf

            /// JSON Pointer of a sequence to compare by position (repeatable)
            repeated --ordered ordered: String

            /// Output format: text (default) or json
            optional --output output: String

            /// Ask the configured language model to explain the differences
            optional --explain
        }

        /// Explain a saved difference report
        cmd explain {
            /// Report file written by `enveye compare --output json`
            required report: PathBuf
        }

        /// Collect a snapshot of this machine's environment for one application
        cmd collect {
            /// Folder the application is installed in
            required app_folder: PathBuf

            /// Application type: desktop or web
            required --app-type app_type: String

            /// Where to write the snapshot (defaults to context_snapshot.json, `-` for stdout)
            optional -o, --output output: PathBuf

            /// Windows service whose status to record (repeatable, replaces the defaults)
            repeated --service service: String

            /// Environment variable to record (repeatable, replaces the defaults)
            repeated --env-var env_var: String

            /// Registry key to record (repeatable, replaces the defaults)
            repeated --registry-key registry_key: String
        }

        /// Run a command on several hosts at once
        cmd remote {
            /// Hosts to run the command on
            repeated hosts: String

            /// Command to run on every host
            required --command command: String

            /// Seconds to wait for each host (default 120)
            optional --timeout timeout: u64

            /// Command line used to reach a host, with {host} and {command} placeholders
            optional --template template: String

            /// Save each host's output to <dir>/<host>.json as a snapshot
            optional --save-dir save_dir: PathBuf
        }
    }
}
