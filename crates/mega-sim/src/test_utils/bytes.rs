/// Pads `bytes` with trailing zeros up to the next multiple of `multiple_of`.
pub fn right_pad_bytes(bytes: impl AsRef<[u8]>, multiple_of: usize) -> Vec<u8> {
    let mut bytes = bytes.as_ref().to_vec();
    let padding = (multiple_of - (bytes.len() % multiple_of)) % multiple_of;
    bytes.resize(bytes.len() + padding, 0);
    bytes
}
