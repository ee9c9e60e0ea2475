// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The per-message pipeline and its background loops (spec §4.3-§4.6,
//! §4.12, §5): Validator → PatternMatcher → Enricher → Router → FileBuffer,
//! plus the batch-write and archive loops.

/// Reverse-DNS, device-registry update, and severity normalization.
pub mod enricher;
/// REGEX/KEYWORD/EXACT rule matching against message payloads.
pub mod pattern_matcher;
/// Ties the stages together into `process_loop`/`batch_write_loop`/
/// `archive_loop`.
pub mod processor;
/// Bounded queue between listeners and the processor.
pub mod queue;
/// Action-handler dispatch and the DISCARD persistence signal.
pub mod router;
/// Pure source_ip/payload presence check.
pub mod validator;
