use core::ops::ControlFlow;

use crate::{
    cursor::{Cursor, ParseError},
    input::{CLIENT_HELLO, HANDSHAKE_TYPE_OFFSET, SERVER_HELLO},
    record::{FourTuple, HandshakeEvent},
};

/// Record header (5) + handshake type (1) + handshake length (3).
const HELLO_VERSION_OFFSET: usize = 9;
const RANDOM_SIZE: usize = 32;
const EXTENSION_HEADER_SIZE: usize = 4;
/// Server name list length (2) + name type (1).
const SERVER_NAME_LIST_HEADER_SIZE: usize = 3;

pub const SERVER_NAME_EXTENSION: u16 = 0x0000;
pub const SUPPORTED_VERSIONS_EXTENSION: u16 = 0x002b;

/// Upper bound on extensions visited per hello, whatever the declared
/// extensions block length says.
pub const EXTENSION_LIST_MAX_SIZE: usize = 100;

/// Builds a partial [`HandshakeEvent`] from a ClientHello record.
///
/// Returns `Ok(None)` when the handshake message is not a ClientHello. Any
/// out-of-bounds read aborts the whole parse.
pub fn parse_client_hello(
    payload: &[u8],
    tuple: FourTuple,
) -> Result<Option<HandshakeEvent>, ParseError> {
    if payload.get(HANDSHAKE_TYPE_OFFSET) != Some(&CLIENT_HELLO) {
        return Ok(None);
    }

    let mut cursor = Cursor::new(payload);
    let mut event = HandshakeEvent::new(tuple);

    cursor.seek(HELLO_VERSION_OFFSET)?;
    event.tls_version = cursor.read_u16()?;
    cursor.skip(RANDOM_SIZE)?;

    let session_id_length = cursor.read_u8()?;
    cursor.skip(session_id_length as usize)?;

    event.ciphers_length = cursor.read_u16()?;
    event.ciphers = cursor.window();
    cursor.skip(event.ciphers_length as usize)?;

    let compression_methods_length = cursor.read_u8()?;
    cursor.skip(compression_methods_length as usize)?;

    let extensions_length = cursor.read_u16()?;
    walk_extensions(&mut cursor, extensions_length, |extension_type, data| {
        match extension_type {
            SERVER_NAME_EXTENSION => {
                data.skip(SERVER_NAME_LIST_HEADER_SIZE)?;
                event.server_name_length = data.read_u16()?;
                event.server_name = data.window();
            }
            SUPPORTED_VERSIONS_EXTENSION => {
                event.tls_versions_length = data.read_u8()?;
                event.tls_versions = data.window();
            }
            _ => {}
        }
        Ok(ControlFlow::Continue(()))
    })?;

    Ok(Some(event))
}

/// How much of a ServerHello made it into the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHelloParse {
    NotServerHello,
    Complete,
    /// Version and cipher were read but the extension walk ran off the view.
    Partial(ParseError),
}

/// Completes `event` with the negotiated version and cipher of a ServerHello.
///
/// A supported_versions extension overrides the legacy version field. An
/// `Err` means the fixed fields could not be read and `event` is untouched.
pub fn parse_server_hello(
    payload: &[u8],
    event: &mut HandshakeEvent,
) -> Result<ServerHelloParse, ParseError> {
    if payload.get(HANDSHAKE_TYPE_OFFSET) != Some(&SERVER_HELLO) {
        return Ok(ServerHelloParse::NotServerHello);
    }

    let mut cursor = Cursor::new(payload);

    cursor.seek(HELLO_VERSION_OFFSET)?;
    let used_tls_version = cursor.read_u16()?;
    cursor.skip(RANDOM_SIZE)?;

    let session_id_length = cursor.read_u8()?;
    cursor.skip(session_id_length as usize)?;

    let used_cipher = cursor.read_u16()?;

    let compression_method_length = cursor.read_u8()?;
    cursor.skip(compression_method_length as usize)?;

    event.used_tls_version = used_tls_version;
    event.used_cipher = used_cipher;

    let walked = cursor.read_u16().and_then(|extensions_length| {
        walk_extensions(&mut cursor, extensions_length, |extension_type, data| {
            if extension_type == SUPPORTED_VERSIONS_EXTENSION {
                event.used_tls_version = data.read_u16()?;
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        })
    });

    Ok(match walked {
        Ok(()) => ServerHelloParse::Complete,
        Err(err) => ServerHelloParse::Partial(err),
    })
}

/// Visits at most [`EXTENSION_LIST_MAX_SIZE`] extensions of a block that
/// starts at the cursor. `visit` receives the extension type and a cursor
/// positioned at the extension data; the walk reseeks after every visit so
/// the visitor may read as much or as little as it likes.
fn walk_extensions<F>(
    cursor: &mut Cursor<'_>,
    block_length: u16,
    mut visit: F,
) -> Result<(), ParseError>
where
    F: FnMut(u16, &mut Cursor<'_>) -> Result<ControlFlow<()>, ParseError>,
{
    let block_length = block_length as usize;
    let start = cursor.position();
    let mut offset = 0usize;

    for _ in 0..EXTENSION_LIST_MAX_SIZE {
        if offset >= block_length {
            break;
        }
        cursor.seek(start.saturating_add(offset))?;
        let extension_type = cursor.read_u16()?;
        let extension_length = cursor.read_u16()? as usize;

        if visit(extension_type, cursor)?.is_break() {
            break;
        }
        offset = offset
            .saturating_add(EXTENSION_HEADER_SIZE)
            .saturating_add(extension_length);
    }
    Ok(())
}
