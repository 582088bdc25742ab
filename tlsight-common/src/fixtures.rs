//! Byte-level builders for ClientHello and ServerHello records, used by tests
//! across the workspace.

use alloc::vec::Vec;

use crate::{
    hello::{SERVER_NAME_EXTENSION, SUPPORTED_VERSIONS_EXTENSION},
    input::{CLIENT_HELLO, HANDSHAKE_RECORD, SERVER_HELLO},
};

#[derive(Debug, Clone)]
pub struct ClientHelloBuilder {
    version: u16,
    session_id: Vec<u8>,
    ciphers: Vec<u16>,
    extensions: Vec<(u16, Vec<u8>)>,
    extensions_length: Option<u16>,
}

impl Default for ClientHelloBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientHelloBuilder {
    pub fn new() -> Self {
        Self {
            version: 0x0303,
            session_id: Vec::new(),
            ciphers: Vec::from([0x1301, 0x1302, 0x1303]),
            extensions: Vec::new(),
            extensions_length: None,
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn session_id(mut self, session_id: &[u8]) -> Self {
        self.session_id = session_id.to_vec();
        self
    }

    pub fn ciphers(mut self, ciphers: &[u16]) -> Self {
        self.ciphers = ciphers.to_vec();
        self
    }

    pub fn server_name(self, name: &str) -> Self {
        self.server_name_bytes(name.as_bytes())
    }

    pub fn server_name_bytes(self, name: &[u8]) -> Self {
        let mut data = Vec::new();
        push_u16(&mut data, (name.len() + 3) as u16); // server name list length
        data.push(0x00); // host_name
        push_u16(&mut data, name.len() as u16);
        data.extend_from_slice(name);
        self.extension(SERVER_NAME_EXTENSION, &data)
    }

    pub fn supported_versions(self, versions: &[u16]) -> Self {
        let mut data = Vec::new();
        data.push((versions.len() * 2) as u8);
        for version in versions {
            push_u16(&mut data, *version);
        }
        self.extension(SUPPORTED_VERSIONS_EXTENSION, &data)
    }

    pub fn extension(mut self, extension_type: u16, data: &[u8]) -> Self {
        self.extensions.push((extension_type, data.to_vec()));
        self
    }

    /// Overrides the declared extensions block length.
    pub fn extensions_length(mut self, length: u16) -> Self {
        self.extensions_length = Some(length);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        push_u16(&mut body, self.version);
        body.extend_from_slice(&[0x5a; 32]);
        body.push(self.session_id.len() as u8);
        body.extend_from_slice(&self.session_id);
        push_u16(&mut body, (self.ciphers.len() * 2) as u16);
        for cipher in &self.ciphers {
            push_u16(&mut body, *cipher);
        }
        body.extend_from_slice(&[0x01, 0x00]); // null compression only

        let extensions = encode_extensions(&self.extensions);
        push_u16(
            &mut body,
            self.extensions_length.unwrap_or(extensions.len() as u16),
        );
        body.extend_from_slice(&extensions);

        wrap_handshake(CLIENT_HELLO, &body)
    }
}

#[derive(Debug, Clone)]
pub struct ServerHelloBuilder {
    version: u16,
    session_id: Vec<u8>,
    cipher: u16,
    extensions: Option<Vec<(u16, Vec<u8>)>>,
}

impl Default for ServerHelloBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHelloBuilder {
    pub fn new() -> Self {
        Self {
            version: 0x0303,
            session_id: Vec::new(),
            cipher: 0x1301,
            extensions: Some(Vec::new()),
        }
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn session_id(mut self, session_id: &[u8]) -> Self {
        self.session_id = session_id.to_vec();
        self
    }

    pub fn cipher(mut self, cipher: u16) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn supported_version(self, version: u16) -> Self {
        self.extension(SUPPORTED_VERSIONS_EXTENSION, &version.to_be_bytes())
    }

    pub fn extension(mut self, extension_type: u16, data: &[u8]) -> Self {
        self.extensions
            .get_or_insert_with(Vec::new)
            .push((extension_type, data.to_vec()));
        self
    }

    /// Ends the message right after the compression method, as pre-TLS 1.2
    /// servers without extensions do.
    pub fn without_extensions(mut self) -> Self {
        self.extensions = None;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = Vec::new();
        push_u16(&mut body, self.version);
        body.extend_from_slice(&[0xa5; 32]);
        body.push(self.session_id.len() as u8);
        body.extend_from_slice(&self.session_id);
        push_u16(&mut body, self.cipher);
        body.push(0x00); // compression method

        if let Some(extensions) = &self.extensions {
            let extensions = encode_extensions(extensions);
            push_u16(&mut body, extensions.len() as u16);
            body.extend_from_slice(&extensions);
        }

        wrap_handshake(SERVER_HELLO, &body)
    }
}

fn encode_extensions(extensions: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (extension_type, data) in extensions {
        push_u16(&mut out, *extension_type);
        push_u16(&mut out, data.len() as u16);
        out.extend_from_slice(data);
    }
    out
}

fn wrap_handshake(handshake_type: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 9);
    out.push(HANDSHAKE_RECORD);
    push_u16(&mut out, 0x0301);
    push_u16(&mut out, (body.len() + 4) as u16);
    out.push(handshake_type);
    let len = body.len() as u32;
    out.extend_from_slice(&len.to_be_bytes()[1..]);
    out.extend_from_slice(body);
    out
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}
