use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::backend::{Backend, MemoryBackend};
use crate::config::ConnectionConfig;
use crate::envelope::Envelope;
use crate::error::QueueError;
use crate::queue::{unix_now, validate_message_attributes, Delay, PushOptions, WorkQueue};

mod common;
mod push;
mod release;

use common::*;
