//! Reading and writing preprocessing inputs and outputs from and to disk.
//!
//! Every collection is stored as a raw dump of its elements in its own file,
//! so a graph directory contains files like `first_out`, `head` and `weight`.
//! Import the `Load` and `Store` traits and use `load_from` and `write_to` for single collections,
//! `Deconstruct` and `Reconstruct` for types made up of several collections.
//!
//! # Example
//!
//! ```no_run
//! # use rust_ch_contractor::io::*;
//!
//! let head = Vec::<u32>::load_from("graph/head")?;
//! head.write_to(&"output/head")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{
    ffi::OsStr,
    fs::{metadata, File},
    io::{prelude::*, Error, ErrorKind, Result},
    mem,
    path::Path,
    slice,
};

/// Access to the data of an object as a slice of bytes.
///
/// Do not use this trait directly but rather the `Store` trait.
pub trait DataBytes {
    fn data_bytes(&self) -> &[u8];
}

/// Mutable access to the bytes of a precreated object of the right size,
/// so serialized data can be read straight into it.
///
/// Do not use this trait directly but rather the `Load` trait.
pub trait DataBytesMut {
    fn data_bytes_mut(&mut self) -> &mut [u8];
}

impl<T: Copy> DataBytes for [T] {
    fn data_bytes(&self) -> &[u8] {
        let num_bytes = mem::size_of_val(self);
        unsafe { slice::from_raw_parts(self.as_ptr() as *const u8, num_bytes) }
    }
}

impl<T: Copy> DataBytes for &[T] {
    fn data_bytes(&self) -> &[u8] {
        (**self).data_bytes()
    }
}

impl<T: Copy> DataBytes for Vec<T> {
    fn data_bytes(&self) -> &[u8] {
        self[..].data_bytes()
    }
}

impl<T: Copy> DataBytesMut for [T] {
    fn data_bytes_mut(&mut self) -> &mut [u8] {
        let num_bytes = mem::size_of_val(self);
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr() as *mut u8, num_bytes) }
    }
}

impl<T: Copy> DataBytesMut for Vec<T> {
    fn data_bytes_mut(&mut self) -> &mut [u8] {
        self[..].data_bytes_mut()
    }
}

/// Extends `DataBytes` with a method to write objects to disk.
pub trait Store: DataBytes {
    /// Writes the serialized object to the file with the given path
    fn write_to(&self, path: &dyn AsRef<Path>) -> Result<()> {
        File::create(path)?.write_all(self.data_bytes())
    }
}

impl<T: DataBytes> Store for T {}
impl<T> Store for [T] where [T]: DataBytes {}

/// Load serialized data back into objects.
pub trait Load: DataBytesMut + Sized {
    /// Create an object of the correct size for serialized data with the given number of bytes.
    fn new_with_bytes(num_bytes: usize) -> Result<Self>;

    /// Read the file at `path` into a new object of the appropriate size.
    fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let metadata = metadata(path.as_ref())?;
        let mut file = File::open(path)?;

        let mut object = Self::new_with_bytes(metadata.len() as usize)?;
        assert_eq!(metadata.len() as usize, object.data_bytes_mut().len());
        file.read_exact(object.data_bytes_mut())?;

        Ok(object)
    }
}

impl<T: Default + Copy> Load for Vec<T> {
    fn new_with_bytes(num_bytes: usize) -> Result<Self> {
        if num_bytes % mem::size_of::<T>() != 0 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("{} bytes are not a multiple of the element size {}", num_bytes, mem::size_of::<T>()),
            ));
        }
        Ok(vec![T::default(); num_bytes / mem::size_of::<T>()])
    }
}

/// Serialize objects which consist of more than a single file.
pub trait Deconstruct: Sized {
    /// Should call `store_callback` once for each file that should be written to disk.
    /// The first param of the callback names the file, the second is the data to be stored.
    fn store_each(&self, store_callback: &dyn Fn(&str, &dyn Store) -> Result<()>) -> Result<()>;

    /// Store this object in the directory `dir`.
    fn deconstruct_to<D: AsRef<OsStr>>(&self, dir: &D) -> Result<()> {
        let path = Path::new(dir);

        self.store_each(&|name, object: &dyn Store| object.write_to(&path.join(name)))
    }
}

/// Helper handed to `Reconstruct::reconstruct_with` for loading the files of a directory.
#[derive(Debug)]
pub struct Loader<'a> {
    path: &'a Path,
}

impl<'a> Loader<'a> {
    /// Load the file with the given name. Should be the same name that was used with the `store_each` callback.
    pub fn load<T: Load, P: AsRef<Path>>(&self, path: P) -> Result<T> {
        T::load_from(self.path.join(path))
    }
}

/// Deserialize objects which consist of more than a single file.
pub trait Reconstruct: Sized {
    /// Should use the loader to load all the necessary files back.
    fn reconstruct_with(loader: Loader) -> Result<Self>;

    /// Reconstruct an object from the directory `dir`.
    fn reconstruct_from<D: AsRef<OsStr>>(dir: &D) -> Result<Self> {
        let path = Path::new(dir);
        Self::reconstruct_with(Loader { path })
    }
}

/// Write a single little endian `u32`.
pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a length prefixed sequence of `u32`s.
pub fn write_u32_sequence<W: Write>(writer: &mut W, values: &[u32]) -> Result<()> {
    let len = u32::try_from(values.len()).map_err(|_| Error::new(ErrorKind::InvalidInput, "sequence too long for a u32 length prefix"))?;
    write_u32(writer, len)?;
    values.iter().try_for_each(|&value| write_u32(writer, value))
}

/// Read a single little endian `u32`.
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read a `u32` sequence as written by `write_u32_sequence`.
pub fn read_u32_sequence<R: Read>(reader: &mut R) -> Result<Vec<u32>> {
    let len = read_u32(reader)? as usize;
    (0..len).map(|_| read_u32(reader)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collections_survive_a_trip_through_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights");
        vec![3u32, 1, 4, 1, 5].write_to(&path).unwrap();
        let loaded = Vec::<u32>::load_from(&path).unwrap();
        assert_eq!(loaded, vec![3, 1, 4, 1, 5]);
    }

    #[test]
    fn truncated_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken");
        vec![7u8; 5].write_to(&path).unwrap();
        assert!(Vec::<u32>::load_from(&path).is_err());
    }

    #[test]
    fn length_prefixed_sequences() {
        let mut buffer = Vec::new();
        write_u32_sequence(&mut buffer, &[10, 20, 30]).unwrap();
        write_u32(&mut buffer, 42).unwrap();
        let mut reader = &buffer[..];
        assert_eq!(read_u32_sequence(&mut reader).unwrap(), vec![10, 20, 30]);
        assert_eq!(read_u32(&mut reader).unwrap(), 42);
        assert!(read_u32(&mut reader).is_err());
    }
}
