// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Small intrusive collections shared by the runtime and MAC layers.

pub mod list;
