/// Undo (or apply) the symmetric shuffle obfuscation in place.
///
/// The sign is XORed with the key. A single word is XORed with the key; with
/// more than one word the first and last are swapped and both XORed with the
/// key, leaving the interior untouched. The transform is its own inverse.
pub fn symmetric_shuffle(sign: &mut i32, words: &mut [u32], key: u32) {
    *sign ^= key as i32;

    match words.len() {
        0 => {}
        1 => words[0] ^= key,
        n => {
            let first = words[0];
            words[0] = words[n - 1] ^ key;
            words[n - 1] = first ^ key;
        }
    }
}
