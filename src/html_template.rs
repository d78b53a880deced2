pub const HTML_CONTENT: &str = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Music Annotator</title>
    <script src="https://cdn.tailwindcss.com"></script>
    <script src="https://unpkg.com/vue@3/dist/vue.global.js"></script>
    <script src="https://cdn.plot.ly/plotly-2.27.0.min.js"></script>
</head>
<body class="bg-gray-100 text-gray-800">
    <div id="app" class="min-h-screen p-8">
        <header class="mb-8 flex justify-between items-center bg-white p-4 rounded-lg shadow">
            <div>
                <h1 class="text-3xl font-bold text-indigo-600">Music Annotator</h1>
                <div class="text-sm text-gray-500 mt-1">
                    Upload an MP3, WAV, OGG or FLAC file to extract features, moods, genres and instruments
                </div>
            </div>
            <div class="flex space-x-4 items-center">
                <input type="file" accept=".mp3,.wav,.ogg,.flac" @change="onFileChange"
                       class="text-sm text-gray-600">
                <button
                    @click="analyze"
                    :disabled="!file || isAnalyzing"
                    class="bg-indigo-600 text-white px-4 py-2 rounded hover:bg-indigo-700 disabled:opacity-50 disabled:cursor-not-allowed flex items-center">
                    <span v-if="isAnalyzing" class="mr-2 animate-spin">&#10227;</span>
                    {{ isAnalyzing ? 'Analyzing...' : 'Analyze' }}
                </button>
            </div>
        </header>

        <div v-if="error" class="bg-red-50 border-l-4 border-red-500 p-4 mb-8 rounded text-red-700">
            {{ error }}
        </div>

        <div v-if="result">
            <h2 class="text-xl font-bold mb-4">{{ result.filename }}</h2>

            <div v-if="Object.keys(result.errors).length" class="bg-yellow-50 border-l-4 border-yellow-500 p-4 mb-8 rounded text-sm">
                <div v-for="(msg, section) in result.errors" :key="section">
                    <span class="font-semibold">{{ section }}:</span> {{ msg }}
                </div>
            </div>

            <div class="grid grid-cols-1 lg:grid-cols-2 gap-8 mb-8">
                <div class="bg-white p-6 rounded-lg shadow">
                    <h3 class="text-lg font-bold mb-4">Audio Features</h3>
                    <table class="min-w-full text-sm" v-if="result.features">
                        <tbody>
                            <tr v-for="(value, name) in result.features" :key="name" class="border-b">
                                <td class="py-1 text-gray-500">{{ name }}</td>
                                <td class="py-1 text-right font-mono">{{ formatNumber(value) }}</td>
                            </tr>
                        </tbody>
                    </table>
                </div>

                <div class="bg-white p-6 rounded-lg shadow">
                    <h3 class="text-lg font-bold mb-4">Top Genres</h3>
                    <ol v-if="result.genres" class="space-y-2">
                        <li v-for="g in result.genres" :key="g.index" class="flex justify-between">
                            <span>{{ g.label }}</span>
                            <span class="font-mono">{{ (g.probability * 100).toFixed(1) }}%</span>
                        </li>
                    </ol>
                    <div v-else class="text-gray-400">Not available</div>
                </div>
            </div>

            <div class="grid grid-cols-1 lg:grid-cols-3 gap-8">
                <div class="bg-white p-4 rounded-lg shadow"><div id="chart-mood"></div></div>
                <div class="bg-white p-4 rounded-lg shadow"><div id="chart-instruments"></div></div>
                <div class="bg-white p-4 rounded-lg shadow"><div id="chart-themes"></div></div>
            </div>
        </div>
    </div>

    <script>
        const { createApp, ref, nextTick } = Vue;

        createApp({
            setup() {
                const file = ref(null);
                const isAnalyzing = ref(false);
                const result = ref(null);
                const error = ref('');

                const onFileChange = (e) => {
                    file.value = e.target.files[0] || null;
                };

                const drawChart = (id, figure) => {
                    const el = document.getElementById(id);
                    if (!el) return;
                    if (!figure) {
                        Plotly.purge(el);
                        el.innerHTML = '';
                        return;
                    }
                    Plotly.newPlot(el, figure.data, figure.layout, { responsive: true });
                };

                const analyze = async () => {
                    if (!file.value) return;
                    isAnalyzing.value = true;
                    error.value = '';

                    const body = new FormData();
                    body.append('audio', file.value);
                    try {
                        const res = await fetch('/api/analyze', { method: 'POST', body });
                        const data = await res.json();
                        if (!res.ok) {
                            error.value = data.error || ('Request failed: ' + res.status);
                            return;
                        }
                        result.value = data;
                        await nextTick();
                        drawChart('chart-mood', data.charts.mood_radar);
                        drawChart('chart-instruments', data.charts.instruments);
                        drawChart('chart-themes', data.charts.mood_themes);
                    } catch (e) {
                        error.value = 'Error analyzing file: ' + e;
                    } finally {
                        isAnalyzing.value = false;
                    }
                };

                const formatNumber = (v) => {
                    if (v === null || v === undefined) return '-';
                    if (typeof v === 'number') return v.toFixed(4);
                    return v;
                };

                return {
                    file,
                    isAnalyzing,
                    result,
                    error,
                    onFileChange,
                    analyze,
                    formatNumber
                };
            }
        }).mount('#app');
    </script>
</body>
</html>
"#;
