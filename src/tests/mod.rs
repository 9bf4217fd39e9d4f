// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod dag;
mod interpreter;
mod scheduler;
mod scope;
mod types;
