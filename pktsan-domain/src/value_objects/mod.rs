// /////////////////////////////////////////////////////////////////////////////
// pktsan
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Immutable value objects shared across the pipeline.

pub mod config;
pub mod flow_key;
pub mod ip_mapping;
pub mod layers;
pub mod preservation_mask;
pub mod stage_stats;
pub mod tls_record;

pub use config::{AnonConfig, DedupConfig, MaskConfig, MaskPreservePolicy, PipelineConfig};
pub use flow_key::{Direction, Endpoint, FlowKey};
pub use ip_mapping::IpMappingTable;
pub use layers::{
    EncapsulationStack, IpLayerInfo, LayerDescriptor, LayerKind, TcpFlags, TransportHeader,
    TransportProtocol,
};
pub use preservation_mask::PreservationMask;
pub use stage_stats::{RunResult, StageStats};
pub use tls_record::{ContentType, TlsRecord};
