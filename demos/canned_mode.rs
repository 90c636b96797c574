// In: demos/canned_mode.rs
//
// Trains a canned Huffman table on a sample of small records, then compresses each
// record on its own: once with a dynamic header, once headerless in canned mode and
// once in canned mode with a preset dictionary built from the sample.

use canned_deflate::config::MonitoringConfig;
use canned_deflate::dictionary::query_size;
use canned_deflate::job::{compress_in_chunks, decompress_in_chunks, ChunkSizes};
use canned_deflate::table::gather_deflate_statistics;
use canned_deflate::{
    init_logging, CompressSettings, CompressionLevel, DecompressSettings, Dictionary, EngineConfig,
    ExecutionPath, HardwareLevel, HuffmanTable, Job, JobError, JobFlags, SoftwareLevel, TableKind,
    TableRepresentation,
};

fn record(i: usize) -> Vec<u8> {
    format!(
        "{{\"id\":{},\"user\":\"user{}\",\"action\":\"{}\",\"status\":\"ok\"}}\n",
        i,
        i % 17,
        ["login", "logout", "view", "edit"][i % 4]
    )
    .into_bytes()
}

fn compress(settings: CompressSettings<'_>, data: &[u8]) -> Result<Vec<u8>, JobError> {
    let mut job = Job::new(ExecutionPath::Software);
    let out = compress_in_chunks(&mut job, settings, data, ChunkSizes::Single, 4 * data.len() + 64)?;
    job.finalize()?;
    Ok(out)
}

fn main() -> Result<(), JobError> {
    init_logging(&MonitoringConfig::default());
    let path = ExecutionPath::Software;

    let sample: Vec<u8> = (0..500).flat_map(record).collect();
    let histogram =
        gather_deflate_statistics(&sample, CompressionLevel::Default, path, &EngineConfig::default())?;
    let mut table = HuffmanTable::create(TableKind::Combined, TableRepresentation::Deflate, path)?;
    table.init_with_histogram(histogram)?;

    let (sw, hw) = (SoftwareLevel::Level3, HardwareLevel::None);
    let mut dictionary = Dictionary::allocate(query_size(sw, hw, sample.len()));
    dictionary.build(sw, hw, &sample, sample.len())?;

    let mut totals = [0usize; 4];
    for i in 1000..1100 {
        let data = record(i);
        let dynamic = compress(CompressSettings::new(JobFlags::DYNAMIC_HUFFMAN), &data)?;
        let canned = compress(CompressSettings::new(JobFlags::CANNED_MODE).with_table(&table), &data)?;
        let with_dictionary = compress(
            CompressSettings::new(JobFlags::CANNED_MODE)
                .with_table(&table)
                .with_dictionary(&dictionary),
            &data,
        )?;

        let mut job = Job::new(path);
        let decoded = decompress_in_chunks(
            &mut job,
            DecompressSettings::new(JobFlags::CANNED_MODE)
                .with_table(&table)
                .with_dictionary(&dictionary),
            &with_dictionary,
            ChunkSizes::Single,
            data.len(),
        )?;
        job.finalize()?;
        assert_eq!(decoded, data);

        totals[0] += data.len();
        totals[1] += dynamic.len();
        totals[2] += canned.len();
        totals[3] += with_dictionary.len();
    }

    println!("100 records, {} bytes", totals[0]);
    println!("  dynamic header:          {:>6} bytes", totals[1]);
    println!("  canned table:            {:>6} bytes", totals[2]);
    println!("  canned table + dictionary: {:>4} bytes", totals[3]);

    table.destroy()?;
    Ok(())
}
