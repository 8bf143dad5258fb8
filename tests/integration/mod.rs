// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod helpers;

mod claim_protocol_test;
mod crawl_pool_test;
mod maintenance_test;
mod postgres_claim_test;
mod probe_pipeline_test;
