// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bodies of the JSON-over-XML data-object APIs: descriptor info, replica
//! close, and touch.

use serde::{Deserialize, Serialize};

use crate::models::common::json_wire;

/// Input of `GET_FILE_DESCRIPTOR_INFO`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FdRequest {
    pub fd: i32,
}

json_wire!(FdRequest);

/// The replica the descriptor is bound to, as reported by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataObjectInfo {
    #[serde(default)]
    pub replica_number: i32,
    #[serde(default)]
    pub resource_hierarchy: String,
}

/// Output of `GET_FILE_DESCRIPTOR_INFO`; unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorInfo {
    #[serde(default)]
    pub data_object_info: DataObjectInfo,
    #[serde(default)]
    pub replica_token: String,
}

json_wire!(DescriptorInfo);

/// Input of `REPLICA_CLOSE`. Secondary handles of a parallel transfer close
/// with every side effect disabled so only the final close touches the
/// catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaCloseInput {
    pub fd: i32,
    pub update_size: bool,
    pub update_status: bool,
    pub compute_checksum: bool,
    pub send_notifications: bool,
}

impl ReplicaCloseInput {
    pub fn silent(fd: i32) -> Self {
        Self {
            fd,
            update_size: false,
            update_status: false,
            compute_checksum: false,
            send_notifications: false,
        }
    }
}

json_wire!(ReplicaCloseInput);

/// Input of `TOUCH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TouchInput {
    pub logical_path: String,
    pub options: TouchOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TouchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_since_epoch: Option<i64>,
    #[serde(default)]
    pub no_create: bool,
}

json_wire!(TouchInput);
