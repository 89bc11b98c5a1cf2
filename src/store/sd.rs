//! SD card record store.
//!
//! Records live as 8.3 files in the root directory of the first FAT
//! partition. All operations are blocking on the shared SPI bus; the
//! sampling loop is the only caller, so that is acceptable in practice.

use embedded_sdmmc::{
    Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, VolumeIdx, VolumeManager,
};

use super::{BlockStore, OpenMode, RecordName, StoreError};

/// Record store backed by an SD card over SPI.
///
/// The volume and root directory are opened once at [`mount`] and stay open
/// for the life of the store, so record handles remain valid across calls.
/// The card must arrive FAT-formatted; [`format`] is not supported in the
/// field and blank media is reported as [`StoreError::NoFilesystem`].
///
/// [`mount`]: BlockStore::mount
/// [`format`]: BlockStore::format
pub struct SdRecordStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
    root: Option<(RawVolume, RawDirectory)>,
}

impl<S, D, T> SdRecordStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    /// Create a new record store over an initialized SD card driver.
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(sd_card, ts);

        Self {
            volume_mgr,
            root: None,
        }
    }

    fn root_dir(&self) -> Result<RawDirectory, StoreError> {
        self.root.map(|(_, dir)| dir).ok_or(StoreError::Io)
    }
}

fn map_sd_err<E: core::fmt::Debug>(err: embedded_sdmmc::Error<E>) -> StoreError {
    use embedded_sdmmc::Error;

    match err {
        Error::NotFound => StoreError::NotFound,
        Error::FormatError(_) | Error::NoSuchVolume => StoreError::NoFilesystem,
        _ => StoreError::Io,
    }
}

impl<S, D, T> BlockStore for SdRecordStore<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    type Handle = RawFile;

    fn mount(&mut self) -> Result<(), StoreError> {
        if self.root.is_some() {
            return Ok(());
        }

        let volume = self
            .volume_mgr
            .open_raw_volume(VolumeIdx(0))
            .map_err(map_sd_err)?;
        let dir = match self.volume_mgr.open_root_dir(volume) {
            Ok(dir) => dir,
            Err(e) => {
                let _ = self.volume_mgr.close_volume(volume);
                return Err(map_sd_err(e));
            }
        };

        self.root = Some((volume, dir));
        Ok(())
    }

    fn format(&mut self) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    fn create(&mut self, name: &RecordName) -> Result<RawFile, StoreError> {
        let dir = self.root_dir()?;
        self.volume_mgr
            .open_file_in_dir(dir, name.as_str(), Mode::ReadWriteCreateOrTruncate)
            .map_err(map_sd_err)
    }

    fn open(&mut self, name: &RecordName, mode: OpenMode) -> Result<RawFile, StoreError> {
        let dir = self.root_dir()?;
        let mode = match mode {
            OpenMode::ReadOnly => Mode::ReadOnly,
            // Append positions the cursor at the end of the record.
            OpenMode::ReadWrite => Mode::ReadWriteAppend,
        };
        self.volume_mgr
            .open_file_in_dir(dir, name.as_str(), mode)
            .map_err(map_sd_err)
    }

    fn write(&mut self, handle: &mut RawFile, bytes: &[u8]) -> Result<usize, StoreError> {
        self.volume_mgr.write(*handle, bytes).map_err(map_sd_err)?;
        Ok(bytes.len())
    }

    fn read(&mut self, handle: &mut RawFile, buf: &mut [u8]) -> Result<usize, StoreError> {
        match self.volume_mgr.read(*handle, buf) {
            Ok(n) => Ok(n),
            // End of record is a count of zero, not an error.
            Err(embedded_sdmmc::Error::EndOfFile) => Ok(0),
            Err(e) => Err(map_sd_err(e)),
        }
    }

    fn remove(&mut self, name: &RecordName) -> Result<(), StoreError> {
        let dir = self.root_dir()?;
        self.volume_mgr
            .delete_file_in_dir(dir, name.as_str())
            .map_err(map_sd_err)
    }

    fn close(&mut self, handle: RawFile) -> Result<(), StoreError> {
        self.volume_mgr.close_file(handle).map_err(map_sd_err)
    }
}
